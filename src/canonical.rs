use std::collections::BTreeMap;

/// Parameters that carry the signature itself and never take part in the
/// signed payload.
pub const SECURE_HASH: &str = "vnp_SecureHash";
pub const SECURE_HASH_TYPE: &str = "vnp_SecureHashType";

/// Flat parameter set sent to (or received from) the gateway.
///
/// Insertion order is irrelevant: [`encode`] sorts on the escaped keys.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParamSet {
    inner: BTreeMap<String, String>,
}

impl ParamSet {
    pub fn new() -> Self { Self::default() }

    /// Insert a parameter, stringifying the value. Replaces any previous value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl ToString) -> &mut Self {
        self.inner.insert(key.into(), value.to_string());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.inner.get(key).map(String::as_str)
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.inner.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool { self.inner.contains_key(key) }

    pub fn len(&self) -> usize { self.inner.len() }

    pub fn is_empty(&self) -> bool { self.inner.is_empty() }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.inner.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ParamSet {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self { inner: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect() }
    }
}

impl From<BTreeMap<String, String>> for ParamSet {
    fn from(inner: BTreeMap<String, String>) -> Self { Self { inner } }
}

/// Percent-encode with the browser `encodeURIComponent` rule.
///
/// `urlencoding` keeps only `A-Z a-z 0-9 - _ . ~`; the gateway also leaves
/// `! * ' ( )` literal, so those escapes are undone afterwards. Every `%`
/// in the encoded output starts a triple, so the replacements cannot match
/// across an escaped `%25`.
pub fn escape(input: &str) -> String {
    let encoded = urlencoding::encode(input);
    if !encoded.contains('%') {
        return encoded.into_owned();
    }
    encoded
        .replace("%21", "!")
        .replace("%2A", "*")
        .replace("%27", "'")
        .replace("%28", "(")
        .replace("%29", ")")
}

/// Canonical payload: escaped keys in byte order, escaped values with
/// `%20` turned into `+`, joined as `k=v&k=v`.
pub fn encode(params: &ParamSet) -> String {
    let mut pairs: Vec<(String, String)> = params
        .iter()
        .map(|(k, v)| (escape(k), escape(v).replace("%20", "+")))
        .collect();
    // byte-wise, not locale-aware
    pairs.sort_by(|a, b| a.0.as_bytes().cmp(b.0.as_bytes()));
    pairs
        .into_iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&")
}
