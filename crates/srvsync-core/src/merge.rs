//! Extensible attribute merging
//!
//! Several writers share one attribute map on the remote object: this
//! reconciler, the directory itself, and whatever other tooling touches the
//! record. The rules below let us own the attributes we declared without
//! clobbering anybody else's.
//!
//! ```text
//!   key in declared_new                 -> declared_new[key]
//!   key in declared_old only            -> dropped (user removed it)
//!   key in remote_current only          -> remote_current[key] (foreign)
//!   key == internal id key              -> declared_new[key], never remote
//! ```
//!
//! Removal is detected by a key disappearing between the old and the new
//! declaration, never by its absence from the remote object.

use crate::record::AttributeSet;

/// Compute the attribute set to write
///
/// Pure: the same inputs always produce the same output.
pub fn merge(
    remote_current: &AttributeSet,
    declared_old: &AttributeSet,
    declared_new: &AttributeSet,
    internal_id_key: &str,
) -> AttributeSet {
    let mut merged: AttributeSet = remote_current
        .iter()
        .filter(|(key, _)| key.as_str() != internal_id_key && !declared_old.contains_key(*key))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();

    for (key, value) in declared_new {
        merged.insert(key.clone(), value.clone());
    }

    merged
}

/// Strip protocol-internal entries before handing attributes to the caller
///
/// Removes the identity token and any `hidden_keys` (attributes that mirror
/// typed fields or directory bookkeeping).
pub fn project(
    remote_current: &AttributeSet,
    internal_id_key: &str,
    hidden_keys: &[String],
) -> AttributeSet {
    remote_current
        .iter()
        .filter(|(key, _)| {
            key.as_str() != internal_id_key && !hidden_keys.iter().any(|h| h == *key)
        })
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

/// Keep only attributes the caller declared
///
/// An empty declaration keeps nothing. Foreign attributes must never reach
/// the declared state, or the next [`merge`] would treat them as removed.
pub fn restrict_to_declared(projected: AttributeSet, declared: &AttributeSet) -> AttributeSet {
    projected
        .into_iter()
        .filter(|(key, _)| declared.contains_key(key))
        .collect()
}
