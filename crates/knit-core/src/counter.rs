//! Counter values and the increment/default-selection rules.
//!
//! Counts are non-negative integers. With a rollover set, a counter wraps
//! using floored modulo, so stepping below zero lands on `rollover - 1`.
//! Without one, the count grows unbounded and clamps at zero.

use crate::project::Project;
use crate::{KnitError, Result};
use serde::de::{self, MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::num::NonZeroU64;

/// A single tally owned by a project
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counter {
    /// Current value (accepts integer or decimal string on read)
    #[serde(deserialize_with = "deserialize_count")]
    pub count: u64,

    /// Modulus the count wraps at
    #[serde(default)]
    pub rollover: Option<NonZeroU64>,
}

/// Older project documents stored counts as strings
fn deserialize_count<'de, D>(deserializer: D) -> std::result::Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum IntOrString {
        Int(u64),
        Str(String),
    }

    match IntOrString::deserialize(deserializer)? {
        IntOrString::Int(n) => Ok(n),
        IntOrString::Str(s) => s
            .trim()
            .parse::<u64>()
            .map_err(|_| de::Error::custom(format!("count '{s}' is not a non-negative integer"))),
    }
}

impl Counter {
    /// A fresh counter at zero. A rollover of zero is rejected.
    pub fn new(rollover: Option<u64>) -> Result<Self> {
        let rollover = match rollover {
            None => None,
            Some(value) => Some(NonZeroU64::new(value).ok_or_else(|| {
                KnitError::InvalidValue("rollover must be a positive integer".to_string())
            })?),
        };
        Ok(Self { count: 0, rollover })
    }

    /// Whether the count sits inside its rollover range
    pub fn is_valid(&self) -> bool {
        self.rollover.map_or(true, |r| self.count < r.get())
    }
}

/// Apply `delta` to a counter and return the updated value.
///
/// Fails only when an unbounded count would exceed `u64::MAX`.
pub fn increment(counter: &Counter, delta: i64) -> Result<Counter> {
    let sum = i128::from(counter.count) + i128::from(delta);

    let count = match counter.rollover {
        Some(rollover) => sum.rem_euclid(i128::from(rollover.get())) as u64,
        None if sum < 0 => 0,
        None => u64::try_from(sum).map_err(|_| {
            KnitError::InvalidValue(format!(
                "count {} + {} overflows",
                counter.count, delta
            ))
        })?,
    };

    Ok(Counter {
        count,
        rollover: counter.rollover,
    })
}

/// Parse an increment amount handed through as text.
pub fn parse_delta(text: &str) -> Result<i64> {
    text.trim()
        .parse::<i64>()
        .map_err(|_| KnitError::InvalidDelta(text.to_string()))
}

/// Pick the counter an operation acts on.
pub fn resolve_default<'a>(requested: Option<&str>, project: &'a Project) -> Result<&'a str> {
    match requested {
        Some(name) => project
            .counters
            .get_key_value(name)
            .map(|(key, _)| key)
            .ok_or_else(|| KnitError::unknown_counter(name, project.counters.names())),
        None if project.counters.is_empty() => {
            Err(KnitError::NoDefaultCounter(project.name.clone()))
        }
        None => project
            .counters
            .get_key_value(&project.default)
            .map(|(key, _)| key)
            .ok_or_else(|| KnitError::unknown_counter(&project.default, project.counters.names())),
    }
}

/// Informational notice that the requested default was not usable
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefaultFallback {
    pub requested: Option<String>,
    pub chosen: String,
    pub available: Vec<String>,
}

impl fmt::Display for DefaultFallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.requested {
            Some(name) => write!(
                f,
                "The default counter '{}' is not one of [{}]; using the first listed, '{}'. \
                 Change it with `knit default <counter>`.",
                name,
                self.available.join(", "),
                self.chosen
            ),
            None => write!(
                f,
                "No default counter given; using the first listed, '{}'.",
                self.chosen
            ),
        }
    }
}

/// Outcome of [`choose_initial_default`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefaultChoice {
    pub name: String,
    pub fallback: Option<DefaultFallback>,
}

/// Settle the default counter for a new project. Returns `None` when there
/// are no counters to choose from.
pub fn choose_initial_default(candidate: Option<&str>, counters: &Counters) -> Option<DefaultChoice> {
    if let Some(name) = candidate {
        if counters.contains(name) {
            return Some(DefaultChoice {
                name: name.to_string(),
                fallback: None,
            });
        }
    }

    let first = counters.names().next()?.to_string();
    Some(DefaultChoice {
        fallback: Some(DefaultFallback {
            requested: candidate.map(str::to_string),
            chosen: first.clone(),
            available: counters.names().map(str::to_string).collect(),
        }),
        name: first,
    })
}

/// Counters keyed by name, kept in insertion order.
///
/// Serialized as a map; the first entry is the fallback default.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Counters {
    entries: Vec<(String, Counter)>,
}

impl Counters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    pub fn get(&self, name: &str) -> Option<&Counter> {
        self.position(name).map(|i| &self.entries[i].1)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Counter> {
        let i = self.position(name)?;
        Some(&mut self.entries[i].1)
    }

    pub fn get_key_value(&self, name: &str) -> Option<(&str, &Counter)> {
        self.position(name)
            .map(|i| (self.entries[i].0.as_str(), &self.entries[i].1))
    }

    /// Add a counter at the end. Fails if the name is taken.
    pub fn insert(&mut self, name: impl Into<String>, counter: Counter) -> Result<()> {
        let name = name.into();
        if self.contains(&name) {
            return Err(KnitError::DuplicateCounter(name));
        }
        self.entries.push((name, counter));
        Ok(())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Counter)> {
        self.entries.iter().map(|(name, counter)| (name.as_str(), counter))
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.entries.iter().position(|(key, _)| key == name)
    }
}

impl Serialize for Counters {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, counter) in &self.entries {
            map.serialize_entry(name, counter)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Counters {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct CountersVisitor;

        impl<'de> Visitor<'de> for CountersVisitor {
            type Value = Counters;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of counter name to counter")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> std::result::Result<Counters, A::Error> {
                let mut counters = Counters::new();
                while let Some((name, counter)) = access.next_entry::<String, Counter>()? {
                    if counters.contains(&name) {
                        return Err(de::Error::custom(format!("duplicate counter '{name}'")));
                    }
                    counters.entries.push((name, counter));
                }
                Ok(counters)
            }
        }

        deserializer.deserialize_map(CountersVisitor)
    }
}
