use std::{sync::Arc, time::Duration};

use pipeliner_core::{NodeId, Pipeline, Task, TaskId, TaskState, TaskStatus};
use rand::{rngs::StdRng, Rng, SeedableRng};
use tokio::{sync::Mutex, time::sleep};
use tracing::{debug, info, warn};

use crate::shutdown::{shutdown_manager::Shutdown, shutdown_reason::ShutdownReason};

/// What a review pass did to the board.
#[derive(Debug, Default)]
pub struct Review {
    pub retried: Vec<TaskId>,
    pub advanced: usize,
    pub approved: Vec<TaskId>,
    pub rejected: Vec<TaskId>,
}

/// Next review step for `task`, if it can take one right now.
fn next_status<R: Rng>(task: &Task, rng: &mut R, reject_chance: f64) -> Option<TaskStatus> {
    match (task.status(), task.state()) {
        (TaskStatus::NotReady, _) => Some(TaskStatus::Ready),
        (TaskStatus::Ready, TaskState::InProgress | TaskState::Done) => Some(TaskStatus::InProgress),
        (TaskStatus::InProgress, TaskState::Done) => Some(TaskStatus::Done),
        (TaskStatus::Done, _) => Some(TaskStatus::Review),
        (TaskStatus::Review, _) => {
            if reject_chance > 0.0 && rng.gen_bool(reject_chance.min(1.0)) {
                Some(TaskStatus::Rejected)
            } else {
                Some(TaskStatus::Approved)
            }
        }
        (TaskStatus::Rejected, _) => Some(TaskStatus::Ready),
        _ => None,
    }
}

/// Walk every task one step through review. Failed work is retried and
/// approved work leaves the board.
pub fn supervise<R: Rng>(pipeline: &mut Pipeline, rng: &mut R, reject_chance: f64) -> Review {
    let mut review = Review::default();

    for (node, task) in pipeline.tasks_in_state(TaskState::Failed) {
        match pipeline.retry(node, task) {
            Ok(()) => review.retried.push(task),
            Err(err) => warn!("Could not retry {}: {}", task, err),
        }
    }

    let steps: Vec<(NodeId, TaskId, TaskStatus)> = pipeline
        .tasks()
        .filter_map(|(node, task)| next_status(task, rng, reject_chance).map(|next| (node, task.id(), next)))
        .collect();

    for (node, task, next) in steps {
        match pipeline.advance_status(node, task, next) {
            Ok(TaskStatus::Approved) => review.approved.push(task),
            Ok(TaskStatus::Rejected) => review.rejected.push(task),
            Ok(status) => {
                debug!("{} is now {}", task, status);
                review.advanced += 1;
            }
            Err(err) => warn!("Could not advance {}: {}", task, err),
        }
    }

    for &task in &review.approved {
        if let Some((node, _)) = pipeline.find_task(task) {
            match pipeline.remove_task(node, task) {
                Ok(_) => info!("{} approved, leaving {}", task, node),
                Err(err) => warn!("Could not remove {}: {}", task, err),
            }
        }
    }

    review
}

pub async fn start_supervisor_fiber(
    pipeline: Arc<Mutex<Pipeline>>,
    review_interval: Duration,
    reject_chance: f64,
    seed: u64,
    shutdown: Arc<Shutdown<ShutdownReason>>,
) {
    let fiber = tokio::spawn(async move {
        let mut rng = StdRng::seed_from_u64(seed);
        loop {
            sleep(review_interval).await;

            let review = {
                let mut pipeline = pipeline.lock().await;
                supervise(&mut pipeline, &mut rng, reject_chance)
            };

            debug!(
                "Review pass: {} retried, {} advanced, {} approved, {} rejected",
                review.retried.len(),
                review.advanced,
                review.approved.len(),
                review.rejected.len()
            );
            for task in &review.rejected {
                info!("{} sent back for rework", task);
            }
        }
    });

    shutdown
        .register_shutdown_task(
            move || {
                Box::pin(async move {
                    fiber.abort();
                    info!("Aborted supervisor fiber");
                    let exit = fiber.await;
                    info!("supervisor exited: {:?}", exit);
                })
            },
            "supervisor",
        )
        .await;
}

#[cfg(test)]
mod tests {
    use pipeliner_core::{NodeConfig, PipelineConfig};

    use super::*;

    fn board_with_done_task() -> (Pipeline, NodeId, TaskId) {
        let mut pipeline = Pipeline::new(PipelineConfig { seed: Some(1) });
        let a = pipeline.add_node(NodeConfig::artist());
        let task = pipeline.create_with(Task::empty);
        let task = pipeline.assign(a, task).unwrap();
        pipeline.tick(1.0);
        (pipeline, a, task)
    }

    #[test]
    fn finished_work_is_approved_and_leaves_the_board() {
        let (mut pipeline, a, task) = board_with_done_task();
        let mut rng = StdRng::seed_from_u64(9);

        let mut approved = Vec::new();
        for _ in 0..6 {
            approved.extend(supervise(&mut pipeline, &mut rng, 0.0).approved);
        }

        assert_eq!(approved, vec![task]);
        assert!(pipeline.node(a).unwrap().tasks().is_empty());
    }

    #[test]
    fn review_waits_for_production() {
        let mut pipeline = Pipeline::new(PipelineConfig { seed: Some(1) });
        let a = pipeline.add_node(NodeConfig::artist());
        let task = pipeline.create_with(Task::medium_compositing);
        let task = pipeline.assign(a, task).unwrap();
        let mut rng = StdRng::seed_from_u64(9);

        for _ in 0..5 {
            supervise(&mut pipeline, &mut rng, 0.0);
        }

        let (_, task) = pipeline.find_task(task).unwrap();
        assert_eq!(task.status(), TaskStatus::InProgress);
    }

    #[test]
    fn rejected_work_goes_back_to_ready() {
        let (mut pipeline, _, task) = board_with_done_task();
        let mut rng = StdRng::seed_from_u64(9);

        // Ready, InProgress, Done, Review
        for _ in 0..4 {
            supervise(&mut pipeline, &mut rng, 1.0);
        }
        let review = supervise(&mut pipeline, &mut rng, 1.0);
        assert_eq!(review.rejected, vec![task]);

        supervise(&mut pipeline, &mut rng, 1.0);
        let (_, reworked) = pipeline.find_task(task).unwrap();
        assert_eq!(reworked.status(), TaskStatus::Ready);
    }

    #[test]
    fn failed_work_is_retried() {
        let mut pipeline = Pipeline::with_policy(PipelineConfig { seed: Some(1) }, |_: u32, _: f32, _: f32| 1.0);
        let a = pipeline.add_node(NodeConfig::artist());
        let task = pipeline.create_with(Task::medium_compositing);
        let task = pipeline.assign(a, task).unwrap();
        pipeline.tick(0.5);
        assert_eq!(pipeline.find_task(task).unwrap().1.state(), TaskState::Failed);

        let mut rng = StdRng::seed_from_u64(9);
        let review = supervise(&mut pipeline, &mut rng, 0.0);
        assert_eq!(review.retried, vec![task]);
        assert_eq!(pipeline.find_task(task).unwrap().1.state(), TaskState::InProgress);
    }
}
