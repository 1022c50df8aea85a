use super::state::MapToggle;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use trailmap_lib::elevation::DEFAULT_TILEQUERY_URL;
use trailmap_lib::layers::{BasemapStyle, RetryPolicy};
use trailmap_lib::{ProfileConfig, SamplerConfig};

#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
/// Trailmap - Elevation profiles and layer control for a backcountry trail map
pub struct Settings {
    /// GeoJSON FeatureCollection with the trail network
    #[clap(long, value_name = "FILE")]
    pub trails: Option<PathBuf>,

    /// Single GPX track to use as the only trail
    #[clap(long, value_name = "FILE", conflicts_with = "trails")]
    pub gpx: Option<PathBuf>,

    /// Access token for the elevation service
    #[clap(long, env = "TRAILMAP_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Tilequery endpoint queried for contour elevations
    #[clap(long, env = "TRAILMAP_TILEQUERY_URL", default_value = DEFAULT_TILEQUERY_URL)]
    pub tilequery_url: String,

    /// Base map style (outdoors, satellite, dark); remembered for next time
    #[clap(long)]
    pub basemap: Option<BasemapStyle>,

    /// Maximum distance between resampled trail points, in kilometers
    #[clap(long, default_value = "0.05")]
    pub max_segment_km: f64,

    /// Samples closer than this to the previous one are dropped, in kilometers
    #[clap(long, default_value = "0.01")]
    pub min_separation_km: f64,

    /// Radius searched for contour features around each point, in meters
    #[clap(long, default_value = "500")]
    pub search_radius_m: f64,

    /// Maximum number of contour features per elevation lookup
    #[clap(long, default_value = "50")]
    pub candidate_limit: usize,

    /// Elevation lookups allowed in flight at once
    #[clap(long, default_value = "32")]
    pub max_concurrent_requests: usize,

    /// Give up on a single elevation lookup after this many milliseconds
    #[clap(long)]
    pub request_timeout_ms: Option<u64>,

    /// Interval between layer restoration attempts after a style swap
    #[clap(long, default_value = "50")]
    pub retry_interval_ms: u64,

    /// Layer restoration attempts before giving up
    #[clap(long, default_value = "100")]
    pub retry_max_attempts: u32,

    /// File holding the persisted layer toggles
    #[clap(long, value_name = "FILE")]
    pub state_file: Option<PathBuf>,

    /// Ignore previously persisted state and start fresh
    #[clap(long, default_value = "false")]
    pub ignore_persisted: bool,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// List the trails of the dataset
    List,

    /// Select a trail and print its elevation profile and statistics as JSON
    Profile {
        #[clap(long)]
        trail_id: String,
    },

    /// Print the map layer stack after applying the persisted toggles
    Layers,

    /// Switch one layer group on or off and remember the choice
    Toggle {
        toggle: MapToggle,
        #[clap(value_parser = parse_on_off, action = clap::ArgAction::Set)]
        on: bool,
    },

    /// Change the 3D terrain settings and remember them
    Terrain {
        #[clap(long)]
        enabled: Option<bool>,
        /// Vertical exaggeration, clamped to 1.0-2.0
        #[clap(long)]
        exaggeration: Option<f64>,
    },
}

fn parse_on_off(value: &str) -> Result<bool, String> {
    match value.to_ascii_lowercase().as_str() {
        "on" | "true" | "show" => Ok(true),
        "off" | "false" | "hide" => Ok(false),
        other => Err(format!("expected on or off, got '{other}'")),
    }
}

impl Settings {
    /// Parse the process arguments, exiting with usage on bad input
    pub fn from_cli() -> Self {
        match Settings::try_parse() {
            Ok(args) => args,
            Err(e) => e.exit(),
        }
    }

    pub fn sampler_config(&self) -> SamplerConfig {
        SamplerConfig {
            radius_m: self.search_radius_m,
            candidate_limit: self.candidate_limit,
            request_timeout: self.request_timeout_ms.map(Duration::from_millis),
            ..SamplerConfig::default()
        }
    }

    pub fn profile_config(&self) -> ProfileConfig {
        ProfileConfig {
            max_segment_km: self.max_segment_km,
            min_separation_km: self.min_separation_km,
            max_concurrent_requests: self.max_concurrent_requests,
            sampler: self.sampler_config(),
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            interval: Duration::from_millis(self.retry_interval_ms),
            max_attempts: self.retry_max_attempts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Settings {
        Settings::try_parse_from(std::iter::once("trailmap").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_defaults_match_library() {
        let settings = parse(&["list"]);
        assert_eq!(settings.profile_config(), ProfileConfig::default());
        assert_eq!(settings.retry_policy(), RetryPolicy::default());
        assert_eq!(settings.tilequery_url, DEFAULT_TILEQUERY_URL);
        assert_eq!(settings.command, Command::List);
        assert!(!settings.ignore_persisted);
    }

    #[test]
    fn test_tunables() {
        let settings = parse(&[
            "--basemap",
            "satellite",
            "--search-radius-m",
            "250",
            "--request-timeout-ms",
            "1500",
            "--retry-max-attempts",
            "5",
            "profile",
            "--trail-id",
            "42",
        ]);
        assert_eq!(settings.basemap, Some(BasemapStyle::Satellite));
        assert_eq!(settings.sampler_config().radius_m, 250.0);
        assert_eq!(
            settings.sampler_config().request_timeout,
            Some(Duration::from_millis(1500))
        );
        assert_eq!(settings.retry_policy().max_attempts, 5);
        assert_eq!(
            settings.command,
            Command::Profile {
                trail_id: "42".to_string()
            }
        );
    }

    #[test]
    fn test_toggle_command() {
        let settings = parse(&["toggle", "cliff-areas", "off"]);
        assert_eq!(
            settings.command,
            Command::Toggle {
                toggle: MapToggle::CliffAreas,
                on: false
            }
        );
    }

    #[test]
    fn test_rejects_bad_input() {
        let args = ["trailmap", "--basemap", "streets", "list"];
        assert!(Settings::try_parse_from(args).is_err());
        let args = ["trailmap", "toggle", "contours", "maybe"];
        assert!(Settings::try_parse_from(args).is_err());
        let args = ["trailmap", "--trails", "a.geojson", "--gpx", "b.gpx", "list"];
        assert!(Settings::try_parse_from(args).is_err());
    }
}
