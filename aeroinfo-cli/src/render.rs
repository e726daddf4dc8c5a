//! Plain-text rendering of lookup progress.

use aeroinfo_core::{
    ElevationSample, ErrorRecord, LookupEvent, ResolvedLocation, WeatherSnapshot,
};

pub fn event(event: &LookupEvent) -> Option<String> {
    match event {
        LookupEvent::Located(loc) => Some(location(loc)),
        LookupEvent::WeatherSettled(Ok(snapshot)) => Some(weather(snapshot)),
        LookupEvent::ElevationSettled(Ok(sample)) => Some(elevation(sample)),
        LookupEvent::Finished(result) if !result.errors.is_empty() => Some(errors(&result.errors)),
        _ => None,
    }
}

pub fn location(loc: &ResolvedLocation) -> String {
    let mut out = String::from("Location Details\n");
    out.push_str(&format!("  Formatted Address: {}\n", loc.formatted_address));
    out.push_str(&format!("  Latitude:  {}\n", loc.coordinate.latitude));
    out.push_str(&format!("  Longitude: {}\n", loc.coordinate.longitude));
    if let Some(country) = &loc.country {
        out.push_str(&format!("  Country:   {country}\n"));
    }
    if let Some(tz) = &loc.timezone_name {
        out.push_str(&format!("  Timezone:  {tz}\n"));
    }
    if let Some(offset) = &loc.timezone_offset {
        out.push_str(&format!("  Offset:    {offset}\n"));
    }
    out.push_str(&format!("  Map:       {}", loc.map_url()));
    out
}

pub fn weather(snapshot: &WeatherSnapshot) -> String {
    let mut out = String::from("Weather Details\n");
    out.push_str(&format!("  Temperature: {} °C\n", snapshot.temperature_c));
    out.push_str(&format!("  Humidity:    {} %\n", snapshot.humidity_pct));
    out.push_str(&format!("  Weather:     {}", snapshot.description));
    if let Some(at) = snapshot.observed_at {
        out.push_str(&format!("\n  Observed:    {}", at.format("%Y-%m-%d %H:%M UTC")));
    }
    out
}

pub fn elevation(sample: &ElevationSample) -> String {
    format!("Elevation: {} meters", sample.elevation_m)
}

pub fn errors(records: &[ErrorRecord]) -> String {
    let mut out = String::from("Errors");
    for rec in records {
        out.push_str(&format!("\n  {rec}"));
    }
    out
}
