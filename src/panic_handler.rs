use crossterm::{
    execute,
    terminal::{LeaveAlternateScreen, disable_raw_mode},
};
use log::error;

/// Leaves the alternate screen before any panic report is printed.
fn restore_terminal() {
    let _ = disable_raw_mode();
    let _ = execute!(std::io::stdout(), LeaveAlternateScreen);
}

pub fn initialize_panic_handler() {
    #[cfg(debug_assertions)]
    {
        let better = better_panic::Settings::auto()
            .most_recent_first(false)
            .lineno_suffix(true)
            .create_panic_handler();
        std::panic::set_hook(Box::new(move |info| {
            restore_terminal();
            error!("Panic: {info}");
            better(info);
        }));
    }

    #[cfg(not(debug_assertions))]
    {
        let metadata = human_panic::metadata!();
        std::panic::set_hook(Box::new(move |info| {
            restore_terminal();
            error!("Panic: {info}");
            let file_path = human_panic::handle_dump(&metadata, info);
            let _ = human_panic::print_msg(file_path, &metadata);
        }));
    }
}
