//! Runs the calc interpreter.
//!
//! With a `FILE` argument the program in the file is run,
//! otherwise an interactive session is started on stdin.
use calc_cli::{Options, USAGE};
use std::{io, process::ExitCode};

fn main() -> ExitCode {
    #[cfg(feature = "tracing")]
    logging::enable();

    let default_panic_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        panic_hook(panic_info);
        default_panic_hook(panic_info);
    }));

    let options = match Options::from_args(std::env::args().skip(1)) {
        Ok(options) => options,
        Err(err) => {
            eprintln!("{err}");
            eprintln!("{USAGE}");
            return ExitCode::from(2);
        }
    };

    if options.help {
        println!("{USAGE}");
        return ExitCode::SUCCESS;
    }

    let result = match options.file {
        Some(path) => calc_cli::run_file(path, options.tree, &mut io::stdout().lock()),
        None => calc_cli::repl(
            io::stdin().lock(),
            &mut io::stdout(),
            &mut io::stderr(),
            options.tree,
        )
        .map_err(calc_cli::error::Run::from),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{err}");
            ExitCode::FAILURE
        }
    }
}

fn panic_hook(panic_info: &std::panic::PanicHookInfo) {
    let payload = if let Some(payload) = panic_info.payload().downcast_ref::<&str>() {
        Some(&**payload)
    } else if let Some(payload) = panic_info.payload().downcast_ref::<String>() {
        Some(payload.as_str())
    } else {
        None
    };

    let location = panic_info.location().map(|location| location.to_string());
    #[cfg(feature = "tracing")]
    tracing::error!("calc panicked at {location:?}: {payload:?}");
    #[cfg(not(feature = "tracing"))]
    let _ = (location, payload);
}

#[cfg(feature = "tracing")]
mod logging {
    use std::io;
    use tracing_subscriber::{
        EnvFilter, Registry,
        fmt::{self, time::UtcTime},
        prelude::*,
    };

    /// Enable logging.
    /// Logs go to stderr, program output to stdout.
    pub fn enable() {
        let console_logger = fmt::layer()
            .with_writer(io::stderr)
            .with_timer(UtcTime::rfc_3339())
            .pretty();

        let subscriber = Registry::default()
            .with(EnvFilter::from_default_env())
            .with(console_logger);

        if let Err(err) = tracing::subscriber::set_global_default(subscriber) {
            eprintln!("could not enable logging: {err}");
        }
    }
}
