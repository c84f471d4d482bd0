// ABOUTME: Version info and REPL banner constants

pub const VERSION: &str = "1.0.0";
pub const WELCOME_MESSAGE: &str = "Spearmint v1.0";
pub const WELCOME_SUBTITLE: &str = "A small dynamically-typed scripting language";
pub const WELCOME_FOOTER: &str =
    "Type an expression and press Enter. `-r <file>` loads a file, `-e`/`-exit` quits.";
