//! CPU/memory pinning against a candidate's NUMA topology.

use hostplan_api::CpuNumaPin;
use hostplan_core::NumaNodeFact;

/// Derive a pin layout for `cpu_count` vCPUs and `memory_mb` of memory.
///
/// Nodes fill greedily in free-memory order. When the request asks for
/// more vCPUs than the topology has free ("extra", over-subscribed CPUs),
/// each extra goes to whichever node currently has the most CPU slack,
/// cycling that node's CPU ids.
pub fn compute_numa_pin(nodes: &[NumaNodeFact], cpu_count: i64, memory_mb: i64) -> Vec<CpuNumaPin> {
    if nodes.is_empty() || cpu_count <= 0 {
        return Vec::new();
    }

    let mut order: Vec<usize> = (0..nodes.len()).collect();
    order.sort_by_key(|&i| (std::cmp::Reverse(nodes[i].free_memory_mb), nodes[i].node_id));

    let mut assigned_cpus = vec![0i64; nodes.len()];
    let mut assigned_mem = vec![0i64; nodes.len()];
    let mut remaining_cpus = cpu_count;
    let mut remaining_mem = memory_mb.max(0);

    for &i in &order {
        let take_cpus = remaining_cpus.min(nodes[i].free_cpus.len() as i64);
        assigned_cpus[i] = take_cpus;
        remaining_cpus -= take_cpus;

        let take_mem = remaining_mem.min(nodes[i].free_memory_mb.max(0));
        assigned_mem[i] = take_mem;
        remaining_mem -= take_mem;
    }

    // Over-subscription: hand out extras one at a time to the slackest node.
    while remaining_cpus > 0 {
        let slackest = (0..nodes.len())
            .filter(|&i| !nodes[i].free_cpus.is_empty())
            .max_by_key(|&i| (nodes[i].free_cpus.len() as i64 - assigned_cpus[i], std::cmp::Reverse(nodes[i].node_id)));
        let Some(i) = slackest else { break };
        assigned_cpus[i] += 1;
        remaining_cpus -= 1;
    }

    // Memory beyond the topology's free total sits on the roomiest node.
    if remaining_mem > 0 {
        assigned_mem[order[0]] += remaining_mem;
    }

    let mut pins = Vec::new();
    for (i, node) in nodes.iter().enumerate() {
        if assigned_cpus[i] == 0 && assigned_mem[i] == 0 {
            continue;
        }
        let cpus = if node.free_cpus.is_empty() {
            Vec::new()
        } else {
            (0..assigned_cpus[i] as usize)
                .map(|k| node.free_cpus[k % node.free_cpus.len()])
                .collect()
        };
        pins.push(CpuNumaPin {
            node_id: node.node_id,
            cpus,
            memory_mb: assigned_mem[i],
        });
    }
    pins
}
