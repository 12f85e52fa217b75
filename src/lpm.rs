//! Longest-prefix-match multibit tries for reverse-zone lookup (SPEC_FULL §4.3).
//!
//! Two independent tries: `Mtrie4` strides 8 bits (one IPv4 octet) per level, `Mtrie6` strides
//! 4 bits (one hex nibble) per level. Both are insert-then-query-only: there is no deletion, and
//! insertion order matters — callers MUST insert longest prefixes first, since a leaf slot is
//! only ever written once (an existing leaf is never overwritten by a less-specific prefix).

use std::collections::HashMap;
use std::net::{Ipv4Addr, Ipv6Addr};

use ipnetwork::{Ipv4Network, Ipv6Network};

use crate::error::{DnsMgrError, Result};

#[derive(Debug, Default)]
struct Node<T> {
    child: HashMap<u16, Node<T>>,
    leaf: HashMap<u16, T>,
}

impl<T> Node<T> {
    fn new() -> Self {
        Node {
            child: HashMap::new(),
            leaf: HashMap::new(),
        }
    }
}

/// IPv4 multibit trie, 8-bit (one octet) stride.
#[derive(Debug, Default)]
pub struct Mtrie4<T> {
    root: Node<T>,
}

impl<T: Clone> Mtrie4<T> {
    pub fn new() -> Self {
        Mtrie4 { root: Node::new() }
    }

    /// Insert `value` for every address covered by `network`. Callers must insert in
    /// longest-prefix-first order; an already-populated leaf slot is left untouched.
    pub fn insert(&mut self, network: Ipv4Network, value: T) {
        let octets = network.network().octets();
        let mut node = &mut self.root;
        let mut len = network.prefix() as u32;
        let mut idx = 0usize;

        while len > 8 {
            let octet = octets[idx] as u16;
            node = node.child.entry(octet).or_insert_with(Node::new);
            idx += 1;
            len -= 8;
        }

        let base = octets[idx] as u32;
        let end = (base + (128u32 >> len)).min(255);
        for ix in base..=end {
            node.leaf.entry(ix as u16).or_insert_with(|| value.clone());
        }
    }

    /// Return the most-specific covering value for `addr`, or `None` if uncovered.
    pub fn lookup(&self, addr: Ipv4Addr) -> Option<T> {
        let octets = addr.octets();
        let mut node = &self.root;
        let mut found: Option<T> = None;

        for &octet in &octets {
            let key = octet as u16;
            if let Some(value) = node.leaf.get(&key) {
                found = Some(value.clone());
            }
            match node.child.get(&key) {
                Some(next) => node = next,
                None => break,
            }
        }

        found
    }
}

/// IPv6 multibit trie, 4-bit (one nibble) stride. IPv6 prefix lengths MUST be nibble-aligned
/// (multiples of 4); callers reject non-nibble lengths before reaching `insert`.
#[derive(Debug, Default)]
pub struct Mtrie6<T> {
    root: Node<T>,
}

fn nibbles_of(addr: Ipv6Addr) -> [u8; 32] {
    let hex = format!("{:032x}", u128::from(addr));
    let mut out = [0u8; 32];
    for (i, c) in hex.chars().enumerate() {
        out[i] = c.to_digit(16).expect("hex formatting only emits hex digits") as u8;
    }
    out
}

impl<T: Clone> Mtrie6<T> {
    pub fn new() -> Self {
        Mtrie6 { root: Node::new() }
    }

    pub fn insert(&mut self, network: Ipv6Network, value: T) -> Result<()> {
        let prefix_len = network.prefix() as u32;
        if prefix_len % 4 != 0 {
            return Err(DnsMgrError::Validation(format!(
                "IPv6 prefix length must be nibble-aligned (multiple of 4), got /{prefix_len}"
            )));
        }

        let nibbles = nibbles_of(network.network());
        let mut node = &mut self.root;
        let mut len = prefix_len;
        let mut idx = 0usize;

        while len > 4 {
            let nibble = nibbles[idx] as u16;
            node = node.child.entry(nibble).or_insert_with(Node::new);
            idx += 1;
            len -= 4;
        }

        let base = nibbles[idx] as u32;
        let end = (base + (8u32 >> len)).min(15);
        for ix in base..=end {
            node.leaf.entry(ix as u16).or_insert_with(|| value.clone());
        }

        Ok(())
    }

    pub fn lookup(&self, addr: Ipv6Addr) -> Option<T> {
        let nibbles = nibbles_of(addr);
        let mut node = &self.root;
        let mut found: Option<T> = None;

        for &nibble in &nibbles {
            let key = nibble as u16;
            if let Some(value) = node.leaf.get(&key) {
                found = Some(value.clone());
            }
            match node.child.get(&key) {
                Some(next) => node = next,
                None => break,
            }
        }

        found
    }
}
