use clap::{Args, Parser, Subcommand, ValueEnum};
use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use terra_client::DEFAULT_BASE_URL;
use terra_core::Region;
use terra_repository::{SortKey, SortOrder};

pub const API_BASE_URL_ENV: &str = "TERRA_API_BASE_URL";
pub const CACHE_TTL_MS_ENV: &str = "TERRA_CACHE_TTL_MS";
pub const CACHE_DISABLED_ENV: &str = "TERRA_CACHE_DISABLED";
pub const REQUEST_TIMEOUT_SECS_ENV: &str = "TERRA_REQUEST_TIMEOUT_SECS";

pub const DEFAULT_CACHE_TTL_MS: u64 = 5 * 60 * 1000;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RegionArg {
    Africa,
    Americas,
    Antarctic,
    Asia,
    Europe,
    Oceania,
}

impl From<RegionArg> for Region {
    fn from(value: RegionArg) -> Self {
        match value {
            RegionArg::Africa => Region::Africa,
            RegionArg::Americas => Region::Americas,
            RegionArg::Antarctic => Region::Antarctic,
            RegionArg::Asia => Region::Asia,
            RegionArg::Europe => Region::Europe,
            RegionArg::Oceania => Region::Oceania,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SortKeyArg {
    Name,
    Population,
}

impl From<SortKeyArg> for SortKey {
    fn from(value: SortKeyArg) -> Self {
        match value {
            SortKeyArg::Name => SortKey::Name,
            SortKeyArg::Population => SortKey::Population,
        }
    }
}

impl Display for SortKeyArg {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&SortKey::from(*self), f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SortOrderArg {
    Asc,
    Desc,
}

impl From<SortOrderArg> for SortOrder {
    fn from(value: SortOrderArg) -> Self {
        match value {
            SortOrderArg::Asc => SortOrder::Asc,
            SortOrderArg::Desc => SortOrder::Desc,
        }
    }
}

impl Display for SortOrderArg {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&SortOrder::from(*self), f)
    }
}

#[derive(Debug, Parser)]
#[command(name = "terra", about = "Browse REST Countries data through the Terra fetch layer")]
pub struct CLI {
    #[arg(long, global = true, env = API_BASE_URL_ENV, default_value = DEFAULT_BASE_URL)]
    pub api_base_url: String,

    /// Cache lifetime of a fetch in milliseconds; 0 disables caching.
    #[arg(long, global = true, env = CACHE_TTL_MS_ENV, default_value_t = DEFAULT_CACHE_TTL_MS)]
    pub cache_ttl_ms: u64,

    #[arg(long, global = true, env = CACHE_DISABLED_ENV)]
    pub cache_disabled: bool,

    #[arg(
        long,
        global = true,
        env = REQUEST_TIMEOUT_SECS_ENV,
        default_value_t = DEFAULT_REQUEST_TIMEOUT_SECS
    )]
    pub request_timeout_secs: u64,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fetch the country list and print a filtered, sorted view of it.
    List(ListArgs),
    /// Fetch one country with its neighbours.
    Detail {
        code: String,
        /// Print the record as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Run fetches as a server render and write the transfer payload.
    Render {
        #[arg(long)]
        out: PathBuf,
        #[command(flatten)]
        target: RenderTarget,
    },
    /// Run fetches as a client session seeded from a transfer payload.
    Hydrate {
        #[arg(long)]
        snapshot: PathBuf,
        #[command(flatten)]
        target: RenderTarget,
    },
}

#[derive(Debug, Args)]
pub struct ListArgs {
    #[arg(long, value_enum)]
    pub region: Option<RegionArg>,

    #[arg(long, default_value = "")]
    pub search: String,

    /// Search every region instead of the selected one.
    #[arg(long)]
    pub search_all: bool,

    #[arg(long, value_enum, default_value_t = SortKeyArg::Name)]
    pub sort: SortKeyArg,

    #[arg(long, value_enum, default_value_t = SortOrderArg::Asc)]
    pub order: SortOrderArg,
}

/// The page a render or hydrate run stands in for.
#[derive(Debug, Args)]
pub struct RenderTarget {
    #[arg(long, value_enum)]
    pub region: Option<RegionArg>,

    /// Also load the detail page of this country.
    #[arg(long)]
    pub detail: Option<String>,
}
