#[macro_use]
extern crate trackable;

use std::fs::File;
use std::io::{BufWriter, Write};

use clap::{App, Arg};
use mkv_fmp4::cache::CachedSource;
use mkv_fmp4::muxer::Muxer;
use mkv_fmp4::source::{ByteRange, FileSource};
use trackable::error::Failure;
use tracing_subscriber::EnvFilter;

fn main() {
    let matches = App::new("mkv_to_fmp4")
        .about("Remuxes a Matroska file into fragmented MP4")
        .arg(Arg::with_name("INPUT").index(1).required(true))
        .arg(Arg::with_name("OUTPUT").index(2).required(true))
        .arg(
            Arg::with_name("START")
                .long("start")
                .takes_value(true)
                .default_value("0"),
        )
        .get_matches();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let start = track_try_unwrap!(matches
        .value_of("START")
        .unwrap()
        .parse::<f64>()
        .map_err(Failure::from_error));
    let source = track_try_unwrap!(FileSource::open(matches.value_of("INPUT").unwrap()));
    let muxer = Muxer::new(ByteRange::new(CachedSource::new(source)));
    eprintln!("MIME type: {}", track_try_unwrap!(muxer.mime_type()));
    eprintln!("Duration: {}s", track_try_unwrap!(muxer.duration()));

    let output = track_try_unwrap!(
        File::create(matches.value_of("OUTPUT").unwrap()).map_err(Failure::from_error)
    );
    let mut output = BufWriter::new(output);
    let init = track_try_unwrap!(muxer.initialization_segment());
    track_try_unwrap!(output.write_all(&init).map_err(Failure::from_error));

    let mut count = 0;
    for fragment in track_try_unwrap!(muxer.stream_from(start)) {
        let bytes = track_try_unwrap!(fragment.and_then(|f| f.into_bytes()));
        track_try_unwrap!(output.write_all(&bytes).map_err(Failure::from_error));
        count += 1;
    }
    track_try_unwrap!(output.flush().map_err(Failure::from_error));
    eprintln!("Wrote {} fragments", count);
}
