use std::{fs::File, io::stdout};

use anyhow::{Result, bail};
use crossterm::{
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use log::{error, info};
use ratatui::{Terminal, backend::CrosstermBackend};
use simplelog::{LevelFilter, WriteLogger};

use novera::event_source::KeyboardEventSource;
use novera::main_app::{App, run_app_with_event_source};
use novera::panic_handler;
use novera::router::{Route, Screen};
use novera::settings;

const USAGE: &str = "usage: novera [<novel_id> [chapter]]";

fn initial_screen() -> Result<Screen> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.as_slice() {
        [] => Ok(Screen::Catalog),
        [flag] if flag == "-h" || flag == "--help" => {
            println!("{USAGE}");
            std::process::exit(0);
        }
        [novel] => Ok(Screen::Reader(
            Route::from_args(novel, None).map_err(anyhow::Error::msg)?,
        )),
        [novel, chapter] => Ok(Screen::Reader(
            Route::from_args(novel, Some(chapter)).map_err(anyhow::Error::msg)?,
        )),
        _ => bail!("{USAGE}"),
    }
}

fn main() -> Result<()> {
    // Initialize panic handler first, before any other setup
    panic_handler::initialize_panic_handler();

    let initial = initial_screen()?;

    WriteLogger::init(
        LevelFilter::Debug,
        simplelog::ConfigBuilder::new()
            .set_max_level(LevelFilter::Debug)
            .add_filter_ignore_str("rustls")
            .add_filter_ignore_str("hyper_util")
            .build(),
        File::create("novera.log")?,
    )?;

    info!("Starting Novera reader");

    // Load settings from ~/.novera_settings.yaml
    settings::load_settings();

    let mut app = App::new(initial)?;

    // Terminal initialization
    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut event_source = KeyboardEventSource;
    let res = run_app_with_event_source(&mut terminal, &mut app, &mut event_source);

    // Restore terminal state
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        error!("Application error: {err:?}");
        println!("{err:?}");
    }

    info!("Shutting down Novera");
    Ok(())
}
