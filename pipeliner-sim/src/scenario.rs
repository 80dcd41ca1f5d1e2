use pipeliner_core::{DayEndPolicy, EngineError, NodeConfig, NodeId, Pipeline, Task, TaskType};

/// Starting board: two artists, the first one with a long queue of empty work
/// and a compositing job, feeding into the second.
pub fn prototype(pipeline: &mut Pipeline, day_end_policy: DayEndPolicy) -> Result<Vec<NodeId>, EngineError> {
    let lead = pipeline.add_node(
        NodeConfig::artist()
            .with_name("A1")
            .with_task_slots(10)
            .with_day_end_policy(day_end_policy),
    );
    let second = pipeline.add_node(
        NodeConfig::artist()
            .with_name("A2")
            .with_day_end_policy(day_end_policy),
    );

    let empties: Vec<Task> = (0..5).map(|_| pipeline.create_with(Task::empty)).collect();
    let compositing = pipeline.create_task(TaskType::Compositing);

    let node = pipeline.node_mut(lead).ok_or(EngineError::NodeNotFound(lead))?;
    for placed in node.add_tasks(empties) {
        placed.map_err(|rejected| rejected.reason)?;
    }
    node.add_task(compositing).map_err(|rejected| rejected.reason)?;

    pipeline.connect(lead, second)?;

    Ok(vec![lead, second])
}
