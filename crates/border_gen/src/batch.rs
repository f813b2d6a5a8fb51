use std::fmt;
use std::path::Path;
use std::thread;

use anyhow::{bail, Context, Result};
use log::{info, warn};

use crate::pipeline::{entity_name, list_entries, EntryKind, Pipeline};

/// One asset that could not be regenerated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    pub category: String,
    pub name: String,
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} > {}", self.category, self.name)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchResult {
    /// Files rewritten successfully.
    pub updated: usize,
    /// In traversal order.
    pub failures: Vec<Failure>,
}

impl BatchResult {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    fn merge(&mut self, other: BatchResult) {
        self.updated += other.updated;
        self.failures.extend(other.failures);
    }
}

/// Walks `<root>/<category>/<file>` and regenerates every file in place.
pub struct BatchDriver<'p, 'a> {
    pipeline: &'p Pipeline<'a>,
    threaded: bool,
}

impl<'p, 'a> BatchDriver<'p, 'a> {
    pub fn new(pipeline: &'p Pipeline<'a>) -> Self {
        Self {
            pipeline,
            threaded: false,
        }
    }

    /// Process each category on its own worker, joined before the next starts.
    pub fn threaded(mut self, threaded: bool) -> Self {
        self.threaded = threaded;
        self
    }

    pub fn run(&self, root: &Path) -> Result<BatchResult> {
        if !root.is_dir() {
            bail!("asset root {} is not a directory", root.display());
        }

        info!("Country border updater initialized ({})", root.display());

        let categories = list_entries(root, EntryKind::Dir)
            .with_context(|| format!("listing categories in {}", root.display()))?;

        let mut result = BatchResult::default();

        for dir in categories {
            let Some(category) = dir.file_name().map(|s| s.to_string_lossy().into_owned()) else {
                continue;
            };
            info!("Updating {category}...");

            let outcome = if self.threaded {
                thread::scope(|scope| {
                    let worker = scope.spawn(|| self.run_category(&category, &dir));
                    worker.join()
                })
                .unwrap_or_else(|_| {
                    warn!("Worker for {category} panicked");
                    BatchResult {
                        updated: 0,
                        failures: vec![Failure {
                            category: category.clone(),
                            name: "*".to_owned(),
                        }],
                    }
                })
            } else {
                self.run_category(&category, &dir)
            };

            result.merge(outcome);
        }

        log_summary(&result);
        Ok(result)
    }

    fn run_category(&self, category: &str, dir: &Path) -> BatchResult {
        let mut result = BatchResult::default();

        let files = match list_entries(dir, EntryKind::File) {
            Ok(files) => files,
            Err(err) => {
                warn!("Cannot list {}: {err}", dir.display());
                result.failures.push(Failure {
                    category: category.to_owned(),
                    name: "*".to_owned(),
                });
                return result;
            }
        };

        for path in files {
            let name = entity_name(category, &path, self.pipeline.codec())
                .unwrap_or_else(|| path.to_string_lossy().into_owned());

            info!("Updating {name}...");

            match self.pipeline.render_entity(&name, &path) {
                Ok(entity) => {
                    info!("Updated {name} ({})", entity.name);
                    result.updated += 1;
                }
                Err(err) => {
                    warn!("Failed to update {name}: {err:#}");
                    result.failures.push(Failure {
                        category: category.to_owned(),
                        name,
                    });
                }
            }
        }

        result
    }
}

fn log_summary(result: &BatchResult) {
    info!("Country border updater finished: {} updated", result.updated);

    if result.is_success() {
        info!("All countries updated successfully.");
        return;
    }

    warn!("Failed to update {} entries:", result.failures.len());
    for failure in &result.failures {
        warn!("\t- {failure}");
    }
}
