//! Bootlink message dispatcher command line interface.

use std::process;

use clap::{
    crate_authors, crate_description, crate_name, crate_version, value_t, App, AppSettings::*, Arg,
};
use console::style;
use log::{debug, trace, LevelFilter};
use simplelog::*;

use bootlink::{self as bl, Dispatcher, NullHandler, TransportMode};

fn main() {
    println!("[BL] bootlink v{}", crate_version!());

    ctrlc::set_handler(move || {
        println!("🛑 received Ctrl+C!");
        process::exit(0);
    })
    .expect("Failed to install my Ctrl-C handler!");

    let matches = App::new(crate_name!())
        .version(format!("v{}", crate_version!()).as_str())
        .author(crate_authors!())
        .about(crate_description!())
        .long_about(
            "\n\
            Relays the messages a target sends over a serial line, a UDP \
            socket or a pair of named pipes to a request handler serving \
            files from the system directory.\n\
            \n\
            Frames on serial lines and pipes are delimited and byte-stuffed; \
            on UDP every datagram is one message. Messages that can't be \
            served are answered with an error reply.\n\
            \n\
            In pipe mode, the dispatcher reopens the pipes when the emulator \
            closes them, and gives up after too many attempts.\
        ",
        )
        .max_term_width(80)
        .setting(ColoredHelp)
        .setting(NextLineHelp)
        .arg(
            Arg::with_name("ADDRESS")
                .help("tty device, local bind address or pipe base path")
                .long_help(
                    "the tty device in serial mode, the local address to bind \
                     in udp mode, or the base path `P` of the `P.in`/`P.out` \
                     pipes in pipe mode.",
                )
                .required(true)
                .index(1),
        )
        .arg(
            Arg::with_name("MODE")
                .help("transport mode")
                .possible_values(&TransportMode::VARIANTS)
                .case_insensitive(true)
                .required(true)
                .index(2),
        )
        .arg(
            Arg::with_name("SPEED_OR_PORT")
                .help("baud rate in serial mode, local port in udp mode")
                .long_help(
                    "the baud rate in serial mode or the local UDP port in udp \
                     mode; ignored in pipe mode.",
                )
                .required(true)
                .index(3),
        )
        .arg(
            Arg::with_name("SYSDIR")
                .help("directory served to the target")
                .required(true)
                .index(4),
        )
        .arg(Arg::with_name("v").short("v").multiple(true).help(
            "Sets the logging level of verbosity, repeat several times for \
                higher verbosity",
        ))
        .get_matches();

    // Vary the output based on how many times the user used the "verbose" flag
    // (i.e. 'bootlink -v -v -v' or 'bootlink -vvv' vs 'bootlink -v'
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

    // Required arguments, clap has already checked they are present.
    let address = matches.value_of("ADDRESS").unwrap_or_default();
    let sysdir = matches.value_of("SYSDIR").unwrap_or_default();

    let mode = value_t!(matches.value_of("MODE"), TransportMode).unwrap_or_else(|e| e.exit());

    let speed_or_port = value_t!(matches.value_of("SPEED_OR_PORT"), u32).unwrap_or_else(|_| {
        println!(
            "{}: `{}` needs to be a numeric value",
            style("error").red(),
            style("SPEED_OR_PORT").cyan()
        );
        println!(
            "   {} `{}` is not a valid value",
            style("-->").cyan(),
            style(matches.value_of("SPEED_OR_PORT").unwrap_or_default()).on_red()
        );
        process::exit(-1);
    });

    let settings = bl::SettingsBuilder::new(address)
        .mode(mode)
        .speed_or_port(speed_or_port)
        .sysdir(sysdir)
        .finalize();
    debug!("{:#?}", settings);

    // Run the state machine ===================================================

    let mut dispatcher = Dispatcher::new(settings, Box::new(NullHandler));
    let exit_code = dispatcher.run();
    debug!("exit code: {}", exit_code);
    process::exit(exit_code);
}
