#[macro_use]
extern crate trackable;

use clap::{App, Arg};
use mkv_fmp4::cache::CachedSource;
use mkv_fmp4::ebml::XmlOptions;
use mkv_fmp4::matroska::MatroskaFile;
use mkv_fmp4::source::{ByteRange, FileSource};
use trackable::error::Failure;
use tracing_subscriber::EnvFilter;

fn main() {
    let matches = App::new("dump_xml")
        .about("Prints the element tree of a Matroska file as XML")
        .arg(Arg::with_name("INPUT").index(1).required(true))
        .arg(
            Arg::with_name("MAX_DEPTH")
                .long("max-depth")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("INDENT")
                .long("indent")
                .takes_value(true)
                .default_value("  "),
        )
        .get_matches();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let input = matches.value_of("INPUT").unwrap();
    let max_depth = matches.value_of("MAX_DEPTH").map(|s| {
        track_try_unwrap!(s.parse::<usize>().map_err(Failure::from_error))
    });
    let options = XmlOptions {
        indent: matches.value_of("INDENT").unwrap().to_owned(),
        max_depth,
    };

    let source = track_try_unwrap!(FileSource::open(input));
    let file = MatroskaFile::new(ByteRange::new(CachedSource::new(source)));
    println!("{}", track_try_unwrap!(file.to_xml(&options)));
}
