//! Multi-instance sensors reconciled from per-line output

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::broadcast;

use super::{EVENT_CHANNEL_CAPACITY, Sensor, SensorEvent, SensorSpec, SensorValue, slugify};
use crate::error::CommandError;
use crate::manager::Manager;

/// Default field separator of dynamic sensor output lines
pub const DEFAULT_SEPARATOR: &str = "|";

/// Key suffix for ids without alphanumerics, such as the `/` mount point
const ROOT_SUFFIX: &str = "root";

/// One parsed output line: `id|value` or `id|name|value`
struct ChildLine<'a> {
    id: &'a str,
    name: Option<&'a str>,
    value: Option<&'a str>,
}

/// A sensor whose value is a list of child sensors keyed by an id
///
/// Each output line carries one child as `id|value` or `id|name|value`.
/// Every update is a full diff against the latest output: new ids create
/// children, present ids update them, missing ids are cleared and removed.
#[derive(Debug)]
pub struct DynamicSensor {
    spec: SensorSpec,
    separator: String,
    children: Mutex<Vec<Arc<Sensor>>>,
    events: broadcast::Sender<SensorEvent>,
}

impl DynamicSensor {
    /// Creates a dynamic sensor; children inherit everything in `spec`
    /// except name and key
    #[must_use]
    pub fn new(spec: SensorSpec) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            spec,
            separator: DEFAULT_SEPARATOR.to_string(),
            children: Mutex::new(Vec::new()),
            events,
        }
    }

    /// Sets the field separator
    #[must_use]
    pub fn with_separator(mut self, separator: impl Into<String>) -> Self {
        self.separator = separator.into();
        self
    }

    /// Display name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.spec.name
    }

    /// Stable key
    #[must_use]
    pub fn key(&self) -> &str {
        &self.spec.key
    }

    /// Template the children are created from
    #[must_use]
    pub const fn spec(&self) -> &SensorSpec {
        &self.spec
    }

    /// Field separator
    #[must_use]
    pub fn separator(&self) -> &str {
        &self.separator
    }

    /// Current children, in creation order
    #[must_use]
    pub fn children(&self) -> Vec<Arc<Sensor>> {
        self.lock_children().clone()
    }

    /// Finds a child by the id from the output
    #[must_use]
    pub fn child(&self, id: &str) -> Option<Arc<Sensor>> {
        self.lock_children()
            .iter()
            .find(|child| child.id() == Some(id))
            .cloned()
    }

    /// Subscribes to child added/removed and reconcile events
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SensorEvent> {
        self.events.subscribe()
    }

    /// Reconciles the children against the latest output.
    ///
    /// `None` clears every child's value but keeps the children.
    pub fn update(&self, lines: Option<&[String]>) {
        let Some(lines) = lines else {
            for child in self.children() {
                child.update(None);
            }
            self.notify_reconciled();
            return;
        };

        let parsed: Vec<ChildLine<'_>> = lines
            .iter()
            .filter(|line| !line.trim().is_empty())
            .map(|line| self.parse_line(line))
            .collect();
        let mut by_id: HashMap<&str, &ChildLine<'_>> = HashMap::with_capacity(parsed.len());
        for line in &parsed {
            by_id.insert(line.id, line);
        }

        let mut removed = Vec::new();
        {
            let mut children = self.lock_children();

            for line in &parsed {
                if children.iter().any(|child| child.id() == Some(line.id)) {
                    continue;
                }
                let child = Arc::new(self.create_child(line, &children));
                tracing::debug!(sensor = %self.spec.key, child = %child.key(), "Adding child sensor");
                let _ = self.events.send(SensorEvent::ChildAdded {
                    parent: self.spec.key.clone(),
                    child: child.key().to_string(),
                });
                children.push(child);
            }

            children.retain(|child| {
                match child.id().and_then(|id| by_id.get(id)) {
                    Some(line) => {
                        child.update(line.value);
                        true
                    }
                    None => {
                        child.update(None);
                        removed.push(child.key().to_string());
                        false
                    }
                }
            });
        }

        for child in removed {
            tracing::debug!(sensor = %self.spec.key, child = %child, "Removing child sensor");
            let _ = self.events.send(SensorEvent::ChildRemoved {
                parent: self.spec.key.clone(),
                child,
            });
        }
        self.notify_reconciled();
    }

    /// Sets `value` on every current child
    ///
    /// # Errors
    ///
    /// Returns the first child's validation or command error.
    pub async fn set(&self, manager: &Manager, value: SensorValue) -> Result<(), CommandError> {
        for child in self.children() {
            child.set(manager, value.clone()).await?;
        }
        Ok(())
    }

    fn parse_line<'a>(&self, line: &'a str) -> ChildLine<'a> {
        let mut fields = line.splitn(3, self.separator.as_str()).map(str::trim);
        let id = fields.next().unwrap_or_default();
        match (fields.next(), fields.next()) {
            (Some(value), None) => ChildLine {
                id,
                name: None,
                value: Some(value),
            },
            (Some(name), Some(value)) => ChildLine {
                id,
                name: Some(name),
                value: Some(value),
            },
            _ => ChildLine {
                id,
                name: None,
                value: None,
            },
        }
    }

    /// Builds the child for `line` with a key unused by `siblings`.
    ///
    /// Ids that slug to the same text (`/` and `/root`) get a numeric
    /// suffix in arrival order, and keep it for as long as they exist.
    fn create_child(&self, line: &ChildLine<'_>, siblings: &[Arc<Sensor>]) -> Sensor {
        let mut spec = self.spec.clone();
        spec.name = line
            .name
            .map_or_else(|| format!("{} {}", self.spec.name, line.id), str::to_string);
        let slug = slugify(line.id);
        let suffix = if slug.is_empty() { ROOT_SUFFIX } else { &slug };
        let base = format!("{}_{}", self.spec.key, suffix);

        let taken = |key: &str| siblings.iter().any(|child| child.key() == key);
        let mut key = base.clone();
        let mut n = 2;
        while taken(&key) {
            key = format!("{base}_{n}");
            n += 1;
        }
        spec.key = key;
        Sensor::with_id(spec, Some(line.id.to_string()))
    }

    fn notify_reconciled(&self) {
        let children = self
            .lock_children()
            .iter()
            .map(|child| child.key().to_string())
            .collect();
        let _ = self.events.send(SensorEvent::Reconciled {
            key: self.spec.key.clone(),
            children,
        });
    }

    fn lock_children(&self) -> std::sync::MutexGuard<'_, Vec<Arc<Sensor>>> {
        self.children.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
