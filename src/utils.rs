use fern::colors::{Color, ColoredLevelConfig};
use log::{Level, LevelFilter};

pub fn set_hook() {
    // setup a panic hook to easily exit the program on panic
    std::panic::set_hook(Box::new(|panic_info| {
        // print the panic message
        let message = if let Some(message) = panic_info.payload().downcast_ref::<String>() {
            message.clone()
        } else if let Some(message) = panic_info.payload().downcast_ref::<&str>() {
            (*message).to_string()
        } else {
            format!("{panic_info:?}")
        };

        log::error!("{message}");

        #[cfg(debug_assertions)]
        log::debug!("{panic_info}");

        std::process::exit(1);
    }));
}

pub fn logs(verbose: bool) {
    let colors = ColoredLevelConfig::new()
        .info(Color::BrightCyan)
        .error(Color::BrightRed)
        .warn(Color::BrightYellow)
        .debug(Color::BrightWhite);

    fern::Dispatch::new()
        .format(move |out, message, record| {
            let level = record.level();

            match level {
                Level::Debug => out.finish(format_args!(
                    "{} [{}]: {}",
                    colors.color(Level::Debug).to_string().to_lowercase(),
                    record.target(),
                    message
                )),

                level => out.finish(format_args!(
                    "{}: {}",
                    colors.color(level).to_string().to_lowercase(),
                    message
                )),
            }
        })
        .level(if verbose {
            LevelFilter::Debug
        } else {
            LevelFilter::Info
        })
        .chain(
            fern::Dispatch::new()
                .filter(|metadata| !matches!(metadata.level(), Level::Error | Level::Warn))
                .chain(std::io::stdout()),
        )
        .chain(
            fern::Dispatch::new()
                .level(log::LevelFilter::Error)
                .level(log::LevelFilter::Warn)
                .chain(std::io::stderr()),
        )
        .apply()
        .ok();
}

/// Split a `KEY=value` line on the first `=`.
pub fn parse_key_val(s: &str) -> Option<(String, String)> {
    s.split_once('=')
        .map(|(key, value)| (key.to_string(), value.to_string()))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_parse_key_val() {
        assert_eq!(
            parse_key_val("FOO=bar=baz"),
            Some(("FOO".to_string(), "bar=baz".to_string()))
        );
        assert_eq!(parse_key_val("FOO"), None);
    }
}
