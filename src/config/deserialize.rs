// ABOUTME: Custom serde deserializers for manifest types.
// ABOUTME: Handles resource names, namespaces, regexes and duration maps.

use regex::Regex;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

use crate::types::{Namespace, ResourceName};

pub fn deserialize_resource_name<'de, D>(deserializer: D) -> Result<ResourceName, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    ResourceName::new(&s).map_err(serde::de::Error::custom)
}

pub fn deserialize_namespace_option<'de, D>(deserializer: D) -> Result<Option<Namespace>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let opt: Option<String> = Option::deserialize(deserializer)?;
    opt.map(|s| Namespace::new(&s).map_err(serde::de::Error::custom))
        .transpose()
}

pub fn deserialize_regex_option<'de, D>(deserializer: D) -> Result<Option<Regex>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let opt: Option<String> = Option::deserialize(deserializer)?;
    opt.map(|s| compile(&s).map_err(serde::de::Error::custom))
        .transpose()
}

pub fn deserialize_regex_map<'de, D>(deserializer: D) -> Result<HashMap<String, Regex>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw: HashMap<String, String> = HashMap::deserialize(deserializer)?;
    raw.into_iter()
        .map(|(container, pattern)| {
            compile(&pattern)
                .map(|re| (container, re))
                .map_err(serde::de::Error::custom)
        })
        .collect()
}

pub fn deserialize_duration_map<'de, D>(
    deserializer: D,
) -> Result<HashMap<String, Duration>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw: HashMap<String, humantime_serde::Serde<Duration>> =
        HashMap::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .map(|(container, grace)| (container, grace.into_inner()))
        .collect())
}

fn compile(pattern: &str) -> Result<Regex, String> {
    Regex::new(pattern).map_err(|e| format!("invalid log regex {pattern:?}: {e}"))
}
