use std::{io::IsTerminal, str::FromStr, sync::Once};

use logforth::{
    append::{FastraceEvent, Stderr},
    filter::EnvFilter,
};

use crate::args::Args;

static INIT: Once = Once::new();

/// Initializes the global logger once per process.
///
/// Emits every record to both stderr (colored when attached to a terminal)
/// and into the active `fastrace` span, so traces carry their own logs.
pub(crate) fn init(args: &Args) {
    let log_filter = args.log.clone();
    let no_color = args.no_color || !std::io::stderr().is_terminal();

    INIT.call_once(move || {
        let filter_for_stderr = log_filter.clone();
        let filter_for_fastrace = log_filter.clone();

        logforth::builder()
            .dispatch(move |d| {
                let filter = parse_filter(&filter_for_stderr);
                let layout = if no_color {
                    logforth::layout::TextLayout::default().no_color()
                } else {
                    logforth::layout::TextLayout::default()
                };

                d.filter(filter).append(Stderr::default().with_layout(layout))
            })
            .dispatch(move |d| d.filter(parse_filter(&filter_for_fastrace)).append(FastraceEvent::default()))
            .apply();
    });
}

fn parse_filter(filter: &str) -> EnvFilter {
    EnvFilter::from_str(filter).unwrap_or_else(|_| EnvFilter::from_str("info").expect("default filter is valid"))
}
