#[macro_export]
macro_rules! regex {
    ($pat:literal) => {{
        static RE: once_cell::sync::Lazy<regex::Regex> =
            once_cell::sync::Lazy::new(|| regex::Regex::new($pat).unwrap());
        &*RE
    }};
}

/// Print a `[tag] key=value` trace line to stderr when `VASPSCAN_DEBUG` is set.
#[macro_export]
macro_rules! trace {
    ($tag:literal, $($arg:tt)*) => {
        if $crate::debug_enabled() {
            eprintln!(concat!("[", $tag, "] {}"), format_args!($($arg)*));
        }
    };
}
