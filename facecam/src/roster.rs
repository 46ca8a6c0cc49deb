use std::collections::HashMap;

use thiserror::Error;

use crate::messages::{AnnotationBatch, Outbound};

// Name the backend gives a face it has not been told about.
const UNNAMED: &str = "Unknown";

#[derive(Debug, Clone, PartialEq)]
pub struct RosterEntry {
    pub id: String,
    pub name: String,
    /// `#rrggbb`, fixed at creation.
    pub color: String,
    pub thumbnail: Option<String>,
    pub samples: u32,
    pub training: bool,
    /// Whether the training toggle can be operated.
    pub toggle_enabled: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Patch {
    InsertRow(RosterEntry),
    SetName { id: String, name: String },
    SetThumbnail { id: String, data_url: String },
    SetSamples { id: String, samples: u32 },
    SetTraining { id: String, on: bool },
    SetToggleEnabled { id: String, enabled: bool },
    SetComposite(String),
    SetProcessingTime(f64),
}

/// Outcome of a user edit: the message to send and the view updates.
#[derive(Debug, Clone, PartialEq)]
pub struct Edit {
    pub message: Outbound,
    pub patches: Vec<Patch>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RosterError {
    #[error("no person matches {0:?}")]
    UnknownTarget(String),

    #[error("name must not be empty")]
    EmptyName,

    #[error("training toggle for {target} is disabled while {active} is training")]
    ToggleDisabled { target: String, active: String },

    #[error("training for {target} is already {}", on_off(.on))]
    AlreadySet { target: String, on: bool },
}

fn on_off(on: &bool) -> &'static str {
    if *on {
        "on"
    } else {
        "off"
    }
}

#[derive(Debug, Default)]
pub struct Roster {
    entries: Vec<RosterEntry>,
    index: HashMap<String, usize>,
    training: Option<String>,
    composite: Option<String>,
    processing_time: Option<f64>,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[RosterEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&RosterEntry> {
        self.index.get(id).map(|&row| &self.entries[row])
    }

    /// Identifier of the person currently in training, if any.
    pub fn training(&self) -> Option<&str> {
        self.training.as_deref()
    }

    pub fn composite(&self) -> Option<&str> {
        self.composite.as_deref()
    }

    pub fn processing_time(&self) -> Option<f64> {
        self.processing_time
    }

    /// Fold one annotation batch into the roster.
    ///
    /// New identifiers get a row; known ones only take the thumbnail
    /// (when present) and the sample count. Name, color and toggle
    /// state of existing rows are never touched here. Reconciling the
    /// same batch again yields no row patches.
    pub fn reconcile(&mut self, batch: &AnnotationBatch) -> Vec<Patch> {
        let mut patches = Vec::new();

        for sighting in &batch.sightings {
            let existing = self.index.get(&sighting.id).copied();
            match existing {
                Some(row) => {
                    let entry = &mut self.entries[row];
                    if let Some(thumbnail) = &sighting.thumbnail {
                        if entry.thumbnail.as_ref() != Some(thumbnail) {
                            entry.thumbnail = Some(thumbnail.clone());
                            patches.push(Patch::SetThumbnail {
                                id: entry.id.clone(),
                                data_url: thumbnail.clone(),
                            });
                        }
                    }
                    if let Some(samples) = sighting.samples {
                        if entry.samples != samples {
                            entry.samples = samples;
                            patches.push(Patch::SetSamples {
                                id: entry.id.clone(),
                                samples,
                            });
                        }
                    }
                }
                None => {
                    let Some(color) = &sighting.color else {
                        log::warn!("skipping new person {} without a color", sighting.id);
                        continue;
                    };
                    let entry = RosterEntry {
                        id: sighting.id.clone(),
                        name: sighting
                            .name
                            .clone()
                            .unwrap_or_else(|| UNNAMED.to_string()),
                        color: color.clone(),
                        thumbnail: sighting.thumbnail.clone(),
                        samples: sighting.samples.unwrap_or(0),
                        training: false,
                        toggle_enabled: self.training.is_none(),
                    };
                    log::debug!("new person {} ({})", entry.id, entry.name);
                    self.index.insert(entry.id.clone(), self.entries.len());
                    self.entries.push(entry.clone());
                    patches.push(Patch::InsertRow(entry));
                }
            }
        }

        self.composite = Some(batch.content.clone());
        self.processing_time = Some(batch.processing_time);
        patches.push(Patch::SetComposite(batch.content.clone()));
        patches.push(Patch::SetProcessingTime(batch.processing_time));
        patches
    }

    /// Find a row by exact identifier or by 1-based row number.
    pub fn resolve(&self, target: &str) -> Result<usize, RosterError> {
        if let Some(&row) = self.index.get(target) {
            return Ok(row);
        }
        target
            .parse::<usize>()
            .ok()
            .and_then(|n| n.checked_sub(1))
            .filter(|&row| row < self.entries.len())
            .ok_or_else(|| RosterError::UnknownTarget(target.to_string()))
    }

    pub fn rename(&mut self, target: &str, name: &str) -> Result<Edit, RosterError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(RosterError::EmptyName);
        }
        let row = self.resolve(target)?;
        let entry = &mut self.entries[row];
        entry.name = name.to_string();

        Ok(Edit {
            message: Outbound::Labeled {
                id: entry.id.clone(),
                name: entry.name.clone(),
            },
            patches: vec![Patch::SetName {
                id: entry.id.clone(),
                name: entry.name.clone(),
            }],
        })
    }

    /// Flip one training toggle.
    ///
    /// Switching one on disables every other toggle; switching it off
    /// enables them all again.
    pub fn set_training(&mut self, target: &str, on: bool) -> Result<Edit, RosterError> {
        let row = self.resolve(target)?;
        let id = self.entries[row].id.clone();

        if !self.entries[row].toggle_enabled {
            return Err(RosterError::ToggleDisabled {
                target: id,
                active: self.training.clone().unwrap_or_default(),
            });
        }
        if self.entries[row].training == on {
            return Err(RosterError::AlreadySet { target: id, on });
        }

        self.entries[row].training = on;
        self.training = on.then(|| id.clone());

        let mut patches = vec![Patch::SetTraining { id: id.clone(), on }];
        for entry in self.entries.iter_mut().filter(|entry| entry.id != id) {
            let enabled = !on;
            if entry.toggle_enabled != enabled {
                entry.toggle_enabled = enabled;
                patches.push(Patch::SetToggleEnabled {
                    id: entry.id.clone(),
                    enabled,
                });
            }
        }

        Ok(Edit {
            message: Outbound::Training {
                id,
                mode: on.into(),
            },
            patches,
        })
    }
}
