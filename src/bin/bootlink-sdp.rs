//! Bootlink serial download protocol flasher command line interface.

use std::process;

use clap::{crate_authors, crate_name, crate_version, App, AppSettings::*, Arg};
use console::style;
use log::{debug, trace, LevelFilter};
use simplelog::*;

use bootlink::{
    error::SessionError, load_script, sdp::HidApiEnumerator, ConsoleOperator, FlashSession,
    FlashSettingsBuilder,
};

fn main() {
    println!("[BL] bootlink-sdp v{}", crate_version!());

    ctrlc::set_handler(move || {
        println!("🛑 received Ctrl+C!");
        process::exit(0);
    })
    .expect("Failed to install my Ctrl-C handler!");

    let matches = App::new(format!("{}-sdp", crate_name!()))
        .version(format!("v{}", crate_version!()).as_str())
        .author(crate_authors!())
        .about("Loads images into an i.MX boot ROM over USB")
        .long_about(
            "\n\
            Runs a flashing script against the serial download protocol of \
            an i.MX boot ROM. One command per line:\n\
               \t* WAIT [vid] \n\
               \t* DCD_WRITE <file> <address> \n\
               \t* WRITE_FILE <file> <address> \n\
               \t* JUMP_ADDRESS <address> \n\
               \t* PROMPT [text] \n\
               \t* ARGS <text>, REBOOT (ignored) \n\
            \n\
            The whole script is checked before the device is touched.\
        ",
        )
        .max_term_width(80)
        .setting(ColoredHelp)
        .setting(NextLineHelp)
        .arg(
            Arg::with_name("SCRIPT")
                .help("path to the flashing script")
                .required(true)
                .index(1),
        )
        .arg(
            Arg::with_name("NO_PROGRESS")
                .help("don't draw progress bars")
                .long("--no-progress"),
        )
        .arg(Arg::with_name("v").short("v").multiple(true).help(
            "Sets the logging level of verbosity, repeat several times for \
                higher verbosity",
        ))
        .get_matches();

    let log_level = match matches.occurrences_of("v") {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };

    TermLogger::init(
        log_level,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )
    .expect("Failed to install the terminal logger!");

    trace!("{:#?}", matches);

    let settings = FlashSettingsBuilder::new(matches.value_of("SCRIPT").unwrap_or_default())
        .show_progress(!matches.is_present("NO_PROGRESS"))
        .finalize();
    debug!("{:#?}", settings);

    // Check the whole script before looking for the device.
    let script = load_script(&settings.script).unwrap_or_else(|e| fail(&e));

    let enumerator = HidApiEnumerator::new().unwrap_or_else(|e| {
        println!("{}: {}", style("error").red(), e);
        process::exit(1);
    });

    let mut session = FlashSession::new(settings, enumerator, ConsoleOperator);
    if let Err(e) = session.run_script(&script) {
        fail(&e);
    }
}

fn fail(e: &SessionError) -> ! {
    println!("{}: {}", style("error").red(), e);
    if let SessionError::Syntax(syntax) = e {
        println!(
            "   {} line {}",
            style("-->").cyan(),
            style(syntax.line()).on_red()
        );
    }
    process::exit(1);
}
