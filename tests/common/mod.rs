//! Shared fixtures: a test application's entry types and host builders

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use elohim_chain::entry::{DataFormat, Entry, EntryDef, Link, LinksEntry, Sharing};
use elohim_chain::hash::{Hash, HashSpec};
use elohim_chain::network::MemoryNetwork;
use elohim_chain::registry::EntryDefRegistry;
use elohim_chain::signing::Agent;
use elohim_chain::validate::{JsonSchemaValidator, RuleValidator};
use elohim_chain::{Host, HostBuilder};

pub const PROFILE_SCHEMA: &str = r#"{
    "title": "Profile Schema",
    "type": "object",
    "properties": {
        "firstName": { "type": "string" },
        "lastName": { "type": "string" },
        "age": { "type": "integer", "minimum": 0 }
    },
    "required": ["firstName", "lastName"]
}"#;

fn parity_rule(name: &'static str, remainder: i64) -> RuleValidator {
    RuleValidator::new(name, move |v| {
        let n: i64 = v
            .as_str()
            .and_then(|s| s.trim().parse().ok())
            .ok_or_else(|| "not a number".to_string())?;
        if n.rem_euclid(2) == remainder {
            Ok(())
        } else {
            Err(format!("{} rejected by {}", n, name))
        }
    })
}

/// evenNumbers, oddNumbers, profile (JSON schema), rating (links) and the
/// private secret type.
pub fn registry() -> EntryDefRegistry {
    let mut reg = EntryDefRegistry::system().unwrap();
    reg.register(
        EntryDef::new("evenNumbers", DataFormat::String, Sharing::Public)
            .with_validator(Arc::new(parity_rule("evenNumbers", 0))),
    )
    .unwrap();
    reg.register(
        EntryDef::new("oddNumbers", DataFormat::String, Sharing::Public)
            .with_validator(Arc::new(parity_rule("oddNumbers", 1))),
    )
    .unwrap();
    reg.register(
        EntryDef::new("profile", DataFormat::Json, Sharing::Public).with_validator(Arc::new(
            JsonSchemaValidator::from_str("profile", PROFILE_SCHEMA).unwrap(),
        )),
    )
    .unwrap();
    reg.register(EntryDef::new("rating", DataFormat::Links, Sharing::Public))
        .unwrap();
    reg.register(EntryDef::new("secret", DataFormat::String, Sharing::Private))
        .unwrap();
    reg
}

pub fn sum(entry: &Entry) -> Hash {
    entry.sum(&HashSpec::default()).unwrap()
}

pub fn rating(base: &Hash, link: &Hash, tag: &str) -> Entry {
    let links = LinksEntry {
        links: vec![Link {
            base: base.to_b58(),
            link: link.to_b58(),
            tag: tag.to_string(),
        }],
    };
    Entry::text(links.to_json().unwrap())
}

/// A standalone host with the test registry.
pub async fn host() -> Arc<Host> {
    HostBuilder::new(Agent::generate("zippy@someemail.com"))
        .registry(registry())
        .build()
        .await
        .unwrap()
}

/// `n` hosts joined to one in-memory network, each knowing all others.
pub async fn network(n: usize) -> (Arc<MemoryNetwork>, Vec<Arc<Host>>) {
    let net = MemoryNetwork::new();
    let mut hosts = Vec::with_capacity(n);
    for i in 0..n {
        let host = HostBuilder::new(Agent::generate(format!("node{}", i)))
            .registry(registry())
            .memory_network(net.clone())
            .build()
            .await
            .unwrap();
        hosts.push(host);
    }
    for a in &hosts {
        for b in &hosts {
            a.add_peer(b.node_id().clone());
        }
    }
    (net, hosts)
}

/// Poll until `check` passes or `limit` elapses.
pub async fn eventually<F, Fut>(limit: Duration, mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + limit;
    loop {
        if check().await {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
