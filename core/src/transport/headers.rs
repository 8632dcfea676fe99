/*
 * headers.rs
 * Copyright (C) 2026 Chris Burdess
 *
 * This file is part of Corriere, a multi-transport message exchange library.
 *
 * Corriere is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * Corriere is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with Corriere.  If not, see <http://www.gnu.org/licenses/>.
 */

//! Ordered header multimap used for request and response metadata on every binding.

/// Ordered multimap of header name to one or more values.
///
/// Insertion order is preserved, names compare ASCII case-insensitively and
/// the first spelling of a name is the one reported by [`names`](Self::names).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransportHeaders {
    entries: Vec<(String, String)>,
}

impl TransportHeaders {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a value. Repeated names accumulate.
    pub fn add(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries.push((name.into(), value.into()));
    }

    /// Replace every value of `name` with a single value.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        self.remove(&name);
        self.entries.push((name, value.into()));
    }

    /// Remove all values of `name`; returns how many were removed.
    pub fn remove(&mut self, name: &str) -> usize {
        let before = self.entries.len();
        self.entries.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        before - self.entries.len()
    }

    /// First value of `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn get_all<'a, 'b>(&'a self, name: &'b str) -> impl Iterator<Item = &'a str> + 'b
    where
        'a: 'b,
    {
        self.entries
            .iter()
            .filter(move |(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|(k, _)| k.eq_ignore_ascii_case(name))
    }

    /// Distinct names in first-seen order.
    pub fn names(&self) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::new();
        for (k, _) in &self.entries {
            if !out.iter().any(|n| n.eq_ignore_ascii_case(k)) {
                out.push(k);
            }
        }
        out
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of values (not distinct names).
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Append every value of `other`, keeping its order.
    pub fn extend_from(&mut self, other: &TransportHeaders) {
        self.entries.extend(other.entries.iter().cloned());
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for TransportHeaders {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut headers = TransportHeaders::new();
        for (k, v) in iter {
            headers.add(k, v);
        }
        headers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_names_keep_all_values_in_order() {
        let mut h = TransportHeaders::new();
        h.add("SOAPAction", "urn:a");
        h.add("X-Trace", "1");
        h.add("soapaction", "urn:b");
        assert_eq!(h.get("SOAPACTION"), Some("urn:a"));
        assert_eq!(h.get_all("SOAPAction").collect::<Vec<_>>(), vec!["urn:a", "urn:b"]);
        assert_eq!(h.names(), vec!["SOAPAction", "X-Trace"]);
        assert_eq!(h.len(), 3);
    }

    #[test]
    fn set_replaces_every_value() {
        let mut h: TransportHeaders = [("Accept", "a"), ("accept", "b")].into_iter().collect();
        h.set("Accept", "c");
        assert_eq!(h.get_all("accept").collect::<Vec<_>>(), vec!["c"]);
        assert_eq!(h.remove("ACCEPT"), 1);
        assert!(h.is_empty());
    }

    #[test]
    fn values_outlive_the_looked_up_name() {
        let h: TransportHeaders = [("Content-Type", "text/xml")].into_iter().collect();
        let value = {
            let name = String::from("content-type");
            h.get(&name)
        };
        assert_eq!(value, Some("text/xml"));
    }
}
