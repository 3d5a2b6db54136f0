//! Merry CLI - plugin-driven scaffolding

use anyhow::Result;
use merry_core::{logging, App};

#[tokio::main]
async fn main() -> Result<()> {
    // Ensure terminal cursor is restored on panic
    let default_panic = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let _ = console::Term::stderr().show_cursor();
        default_panic(info);
    }));

    // Handle Ctrl+C gracefully
    ctrlc::set_handler(move || {
        let _ = console::Term::stderr().show_cursor();
        std::process::exit(130);
    })
    .ok();

    let debug = logging::debug_enabled();
    logging::init(debug);

    let mut app = App::new(debug);
    app.install().await;

    let result = app.run(std::env::args_os()).await;

    // Ensure cursor is visible on normal exit
    let _ = console::Term::stderr().show_cursor();

    result
}
