//! Variable path grammar used by `assign` mappings:
//! `identifier ( "." identifier | "[" index "]" )*`.

use once_cell::sync::Lazy;
use regex::Regex;

static VAR_PATH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z_$][A-Za-z0-9_$]*(?:\.[A-Za-z_$][A-Za-z0-9_$]*|\[\d+\])*$")
        .expect("variable path regex")
});

pub fn is_valid_var_path(path: &str) -> bool {
    VAR_PATH.is_match(path)
}
