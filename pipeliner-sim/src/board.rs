//! Text rendering of the board for the logs.

use pipeliner_core::{Node, Pipeline, Task};

const BAR_WIDTH: usize = 10;

fn bar(fraction: f32) -> String {
    let filled = ((fraction.clamp(0.0, 1.0) * BAR_WIDTH as f32).round() as usize).min(BAR_WIDTH);
    format!("[{}{}]", "#".repeat(filled), ".".repeat(BAR_WIDTH - filled))
}

pub fn task_line(task: &Task) -> String {
    format!(
        "{} {:<18} {} {:>3.0}% {} / {}",
        task.id(),
        task.name(),
        bar(task.progress()),
        task.progress() * 100.0,
        task.state(),
        task.status()
    )
}

pub fn node_lines(node: &Node) -> Vec<String> {
    let mut lines = vec![format!(
        "{} {} lvl {} hours {} {:.1}/{} slots {}/{} day {}",
        node.id(),
        node.name(),
        node.level(),
        bar(node.hour_fraction()),
        node.current_hour(),
        node.work_hours(),
        node.tasks().len(),
        node.task_slots(),
        node.days_worked()
    )];
    if let Some(current) = node.current_task() {
        lines.push(format!("  working on {} {}", current.id(), bar(current.progress())));
    }
    lines.extend(node.tasks().iter().map(|task| format!("  {}", task_line(task))));
    lines
}

pub fn render(pipeline: &Pipeline) -> String {
    let mut lines: Vec<String> = pipeline.nodes().flat_map(node_lines).collect();
    lines.extend(pipeline.connections().iter().map(ToString::to_string));
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use pipeliner_core::{NodeConfig, PipelineConfig, TaskType};

    use super::*;

    #[test]
    fn bars_fill_proportionally() {
        assert_eq!(bar(0.0), "[..........]");
        assert_eq!(bar(0.5), "[#####.....]");
        assert_eq!(bar(2.0), "[##########]");
    }

    #[test]
    fn render_lists_nodes_tasks_and_connections() {
        let mut pipeline = Pipeline::new(PipelineConfig { seed: Some(5) });
        let a = pipeline.add_node(NodeConfig::artist().with_name("A1"));
        let b = pipeline.add_node(NodeConfig::artist().with_name("A2"));
        let task = pipeline.create_task(TaskType::Modeling);
        pipeline.assign(a, task).unwrap();
        pipeline.connect(a, b).unwrap();

        let text = render(&pipeline);
        assert!(text.contains("node-1 A1 lvl 1"));
        assert!(text.contains("slots 1/2"));
        assert!(text.contains("Modeling"));
        assert!(text.contains("In Progress / Not Ready"));
        assert!(text.contains("working on task-1 [..........]"));
        assert!(text.contains("Connection: node-1 -> node-2"));
    }
}
