//! Query-string parameters.
//!
//! Empty strings and `None` values never make it into a [`QueryParams`]: they
//! are dropped at insertion time, so the transport never sends `?param=` and
//! the cache never keys on an empty filter.

/// Conversion into an optional query-string value.
///
/// Returning `None` drops the parameter.
pub trait IntoParam {
    fn into_param(self) -> Option<String>;
}

impl IntoParam for String {
    fn into_param(self) -> Option<String> {
        if self.is_empty() {
            None
        } else {
            Some(self)
        }
    }
}

impl IntoParam for &str {
    fn into_param(self) -> Option<String> {
        self.to_string().into_param()
    }
}

impl IntoParam for &String {
    fn into_param(self) -> Option<String> {
        self.as_str().into_param()
    }
}

impl IntoParam for bool {
    fn into_param(self) -> Option<String> {
        Some(self.to_string())
    }
}

macro_rules! int_into_param {
    ($($t:ty),*) => {
        $(
            impl IntoParam for $t {
                fn into_param(self) -> Option<String> {
                    Some(self.to_string())
                }
            }
        )*
    };
}

int_into_param!(u8, u16, u32, u64, usize, i32, i64);

impl<V: IntoParam> IntoParam for Option<V> {
    fn into_param(self) -> Option<String> {
        self.and_then(IntoParam::into_param)
    }
}

/// Ordered, de-duplicated query parameters.
///
/// Insertion order is kept for the outgoing query string. Inserting an
/// existing key replaces its value in place.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct QueryParams {
    pairs: Vec<(String, String)>,
}

impl QueryParams {
    pub fn new() -> Self {
        QueryParams { pairs: Vec::new() }
    }

    /// Insert a parameter; empty values remove any previous value for `key`.
    pub fn insert<V: IntoParam>(&mut self, key: &str, value: V) -> &mut Self {
        match value.into_param() {
            Some(value) => {
                if let Some(slot) = self.pairs.iter_mut().find(|(k, _)| k == key) {
                    slot.1 = value;
                } else {
                    self.pairs.push((key.to_string(), value));
                }
            }
            None => self.remove(key),
        }
        self
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with<V: IntoParam>(mut self, key: &str, value: V) -> Self {
        self.insert(key, value);
        self
    }

    pub fn remove(&mut self, key: &str) {
        self.pairs.retain(|(k, _)| k != key);
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Pairs in insertion order, as sent on the wire.
    pub fn pairs(&self) -> &[(String, String)] {
        &self.pairs
    }

    /// Order-independent form used in cache keys: sorted by key, with `&`,
    /// `=` and `%` escaped so distinct parameter sets never collide.
    pub fn canonical(&self) -> String {
        let mut sorted: Vec<&(String, String)> = self.pairs.iter().collect();
        sorted.sort();
        sorted
            .iter()
            .map(|(k, v)| format!("{}={}", escape(k), escape(v)))
            .collect::<Vec<_>>()
            .join("&")
    }
}

impl<K: AsRef<str>, V: IntoParam> FromIterator<(K, V)> for QueryParams {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = QueryParams::new();
        for (k, v) in iter {
            params.insert(k.as_ref(), v);
        }
        params
    }
}

fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '%' => out.push_str("%25"),
            '&' => out.push_str("%26"),
            '=' => out.push_str("%3D"),
            _ => out.push(c),
        }
    }
    out
}
