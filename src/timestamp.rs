use ac3spdif::utils::clock::Mtime;

pub fn time_str(sec: f64) -> String {
    let ms = sec * 1000f64;
    let hours = (ms / 3600000f64) as u64;
    let minutes = ((ms % 3600000f64) / 60000f64) as u64;
    let seconds = ((ms % 60000f64) / 1000f64) as u64;
    let milliseconds = (ms % 1000f64) as u64;

    format!(
        "{hours:0width$}:{minutes:02}:{seconds:02}.{milliseconds:03}",
        width = if hours >= 100 { 0 } else { 2 }
    )
}

/// Formats a microsecond date like [`time_str`], keeping the sign.
pub fn mtime_str(date: Mtime) -> String {
    let sign = if date < 0 { "-" } else { "" };
    let ms = date.unsigned_abs() / 1000;
    let hours = ms / 3_600_000;

    format!(
        "{sign}{hours:0width$}:{:02}:{:02}.{:03}",
        ms % 3_600_000 / 60_000,
        ms % 60_000 / 1000,
        ms % 1000,
        width = if hours >= 100 { 0 } else { 2 }
    )
}

#[test]
fn formats_dates() {
    assert_eq!(time_str(3725.5), "01:02:05.500");
    assert_eq!(mtime_str(32_000), "00:00:00.032");
    assert_eq!(mtime_str(-1_500_000), "-00:00:01.500");
    assert_eq!(mtime_str(3_725_500_000), "01:02:05.500");
}
