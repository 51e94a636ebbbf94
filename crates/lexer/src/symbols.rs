//! Prefix trie over operator and punctuation symbols.

use std::collections::HashMap;

#[derive(Debug, Default, Clone)]
struct Node {
    children: HashMap<char, Node>,
    terminal: bool,
}

/// A set of multi-character symbols supporting longest-match lookup.
///
/// The tokenizer walks the trie one character at a time and remembers the last terminal node it
/// passed, which yields the longest registered symbol that prefixes the remaining input.
#[derive(Debug, Default, Clone)]
pub struct SymbolTable {
    root: Node,
    len: usize,
}

impl SymbolTable {
    /// Creates an empty symbol table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a symbol. Empty strings are ignored.
    pub fn insert(&mut self, symbol: &str) {
        if symbol.is_empty() {
            return;
        }
        let mut node = &mut self.root;
        for ch in symbol.chars() {
            node = node.children.entry(ch).or_default();
        }
        if !node.terminal {
            node.terminal = true;
            self.len += 1;
        }
    }

    /// Returns whether the exact symbol is registered.
    pub fn contains(&self, symbol: &str) -> bool {
        let mut node = &self.root;
        for ch in symbol.chars() {
            match node.children.get(&ch) {
                Some(next) => node = next,
                None => return false,
            }
        }
        node.terminal && !symbol.is_empty()
    }

    /// Returns the byte length of the longest registered symbol that prefixes `input`.
    pub fn longest_match(&self, input: &str) -> Option<usize> {
        let mut node = &self.root;
        let mut best = None;
        for (idx, ch) in input.char_indices() {
            match node.children.get(&ch) {
                Some(next) => {
                    node = next;
                    if node.terminal {
                        best = Some(idx + ch.len_utf8());
                    }
                }
                None => break,
            }
        }
        best
    }

    /// Number of registered symbols.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl<'a> FromIterator<&'a str> for SymbolTable {
    fn from_iter<T: IntoIterator<Item = &'a str>>(iter: T) -> Self {
        let mut table = SymbolTable::new();
        for symbol in iter {
            table.insert(symbol);
        }
        table
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn longest_match_prefers_longer_symbols() {
        let table: SymbolTable = [">", ">=", ">>", "=", "=="].into_iter().collect();
        assert_eq!(table.longest_match(">= 3"), Some(2));
        assert_eq!(table.longest_match("> 3"), Some(1));
        assert_eq!(table.longest_match(">>="), Some(2));
        assert_eq!(table.longest_match("abc"), None);
    }

    #[test]
    fn intermediate_nodes_are_not_symbols() {
        let table: SymbolTable = ["?.", "=>"].into_iter().collect();
        assert!(!table.contains("?"));
        assert!(table.contains("?."));
        assert_eq!(table.longest_match("?x"), None);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn duplicate_inserts_are_counted_once() {
        let mut table = SymbolTable::new();
        table.insert("+");
        table.insert("+");
        table.insert("");
        assert_eq!(table.len(), 1);
        assert!(!table.contains(""));
    }
}
