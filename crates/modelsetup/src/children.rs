//! Concurrent materialization of child entities.

use std::sync::Arc;

use modelsetup_client::EntityApi;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, warn};

use crate::context::Context;
use crate::engine::ModelSetup;
use crate::entity::{entities_from_nodes, ModelEntity};
use crate::entity_config::{child_class_name, simple_name, EntityConfig};
use crate::error::{JobFailure, SetupError, SetupResult};

impl ModelSetup {
    /// Materialize every declared child of `parent`, one batch per child type.
    ///
    /// Batches run in declaration order; within a batch at most
    /// `max_concurrency` children are in flight. Any failed child, or a batch
    /// that outlives the child timeout, fails the parent.
    pub(crate) async fn materialize_children(
        &self,
        api: &Arc<dyn EntityApi>,
        config: &EntityConfig,
        parent: &ModelEntity,
        context: &Context,
    ) -> SetupResult<()> {
        for (child_type, items) in parent.children() {
            if !items.is_empty() && config.child(child_type).is_none() {
                return Err(SetupError::UndeclaredChildren {
                    entity_type: parent.entity_type().to_string(),
                    child_type: child_type.clone(),
                });
            }
        }

        let Some(declared) = &config.children else {
            return Ok(());
        };

        for (child_type, child_config) in declared {
            let Some(items) = parent.children().get(child_type).filter(|i| !i.is_empty()) else {
                continue;
            };

            let class_name = child_config
                .class_name
                .clone()
                .unwrap_or_else(|| child_class_name(parent.class_name(), child_type));
            let children = entities_from_nodes(items.clone(), &class_name);

            self.run_batch(api, Arc::new(child_config.clone()), &class_name, children, context)
                .await?;
        }
        Ok(())
    }

    async fn run_batch(
        &self,
        api: &Arc<dyn EntityApi>,
        config: Arc<EntityConfig>,
        class_name: &str,
        children: Vec<ModelEntity>,
        context: &Context,
    ) -> SetupResult<()> {
        let total = children.len();
        if total == 0 {
            return Ok(());
        }

        let entity_type = simple_name(class_name).to_string();
        let permits = total.min(self.settings.max_concurrency).max(1);
        let semaphore = Arc::new(Semaphore::new(permits));
        debug!(
            run = %self.run_label(),
            entity_type = %entity_type,
            total,
            permits,
            "Starting child batch"
        );

        let mut jobs = JoinSet::new();
        let mut failures = Vec::new();

        let batch = async {
            for child in children {
                let id = child.id();
                let Ok(permit) = semaphore.clone().acquire_owned().await else {
                    failures.push(JobFailure {
                        entity: id,
                        error: "batch semaphore closed".into(),
                    });
                    continue;
                };

                let engine = self.clone();
                let api = api.fork();
                let config = config.clone();
                let context = context.branch();
                jobs.spawn(async move {
                    let _permit = permit;
                    let result = engine.materialize(api, config, child, context).await;
                    (id, result)
                });
            }

            while let Some(joined) = jobs.join_next().await {
                match joined {
                    Ok((_, Ok(_))) => {}
                    Ok((id, Err(e))) => {
                        warn!(entity_type = %entity_type, entity = %id, error = %e, "Child job failed");
                        failures.push(JobFailure {
                            entity: id,
                            error: e.to_string(),
                        });
                    }
                    Err(e) => {
                        error!(entity_type = %entity_type, error = %e, "Child job panicked");
                        failures.push(JobFailure {
                            entity: "unknown".into(),
                            error: format!("task failed: {e}"),
                        });
                    }
                }
            }
        };

        let timed_out = tokio::time::timeout(self.settings.child_timeout, batch)
            .await
            .is_err();
        if timed_out {
            jobs.abort_all();
            error!(
                run = %self.run_label(),
                entity_type = %entity_type,
                timeout_secs = self.settings.child_timeout.as_secs(),
                "Child batch timed out"
            );
        }

        if timed_out || !failures.is_empty() {
            return Err(SetupError::BatchFailure {
                entity_type,
                run_label: self.run_label().to_string(),
                total,
                failures,
                timed_out,
            });
        }
        Ok(())
    }
}
