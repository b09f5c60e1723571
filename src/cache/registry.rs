use super::config::CacheConfig;
use super::fetcher::{FetchError, FetchOutcome, Fetcher};
use super::slot::CacheSlot;
use crate::error::Result;
use crate::model::{
    DailyMetrics, Hospital, Municipality, RetirementHome, StatsDay, WeeklyStats, parse_daily,
    parse_directory, parse_stats, parse_weekly_stats,
};
use async_trait::async_trait;
use futures::future::join_all;
use std::sync::Arc;

/// Resource ids, used in URLs, metric labels and alerts.
pub mod ids {
    pub const STATS: &str = "stats";
    pub const STATS_WEEKLY: &str = "stats-weekly";
    pub const REGIONS: &str = "regions";
    pub const REGION_DECEASED: &str = "region-deceased";
    pub const PATIENTS: &str = "patients";
    pub const HOSPITALS: &str = "hospitals";
    pub const RETIREMENT_HOMES: &str = "retirement-homes";
    pub const MUNICIPALITIES: &str = "municipalities";
    pub const HEALTH_CENTERS: &str = "health-centers";
    pub const HOSPITALS_LIST: &str = "hospitals-list";
    pub const MUNICIPALITIES_LIST: &str = "municipalities-list";
    pub const RETIREMENT_HOMES_LIST: &str = "retirement-homes-list";
}

pub type ParseFn<T> = Arc<dyn Fn(&str) -> Result<Vec<T>> + Send + Sync>;

/// What a successful refresh did to the slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Refreshed {
    Published { records: usize },
    Unchanged,
}

/// A resource the scheduler can refresh without knowing its record type.
#[async_trait]
pub trait RefreshTarget: Send + Sync {
    fn id(&self) -> &str;

    fn url(&self) -> &str;

    /// Fetch once and publish into the slot on success.
    async fn refresh(&self, fetcher: &Fetcher) -> std::result::Result<Refreshed, FetchError>;

    /// Resolve once the slot holds its first fetched snapshot.
    async fn wait_populated(&self);
}

/// (URL, slot, parser) for one resource.
pub struct ResourceEntry<T> {
    id: String,
    url: String,
    slot: Arc<CacheSlot<T>>,
    parse: ParseFn<T>,
}

impl<T> ResourceEntry<T> {
    pub fn new(
        id: impl Into<String>,
        url: impl Into<String>,
        slot: Arc<CacheSlot<T>>,
        parse: impl Fn(&str) -> Result<Vec<T>> + Send + Sync + 'static,
    ) -> Self {
        Self {
            id: id.into(),
            url: url.into(),
            slot,
            parse: Arc::new(parse),
        }
    }

    #[must_use]
    pub const fn slot(&self) -> &Arc<CacheSlot<T>> {
        &self.slot
    }
}

#[async_trait]
impl<T: Send + Sync + 'static> RefreshTarget for ResourceEntry<T> {
    fn id(&self) -> &str {
        &self.id
    }

    fn url(&self) -> &str {
        &self.url
    }

    async fn refresh(&self, fetcher: &Fetcher) -> std::result::Result<Refreshed, FetchError> {
        let current = self.slot.read();
        let parse = self.parse.clone();
        let outcome = fetcher
            .fetch(&self.id, &self.url, current.token(), move |raw| parse(raw))
            .await?;

        match outcome {
            FetchOutcome::Updated(snapshot) => {
                let records = snapshot.records.len();
                self.slot.publish(snapshot);
                Ok(Refreshed::Published { records })
            }
            FetchOutcome::NotModified => Ok(Refreshed::Unchanged),
        }
    }

    async fn wait_populated(&self) {
        self.slot.wait_first().await;
    }
}

/// Every cached resource, as typed slots for the read side and as
/// type-erased refresh targets for the scheduler.
pub struct Registry {
    pub stats: Arc<CacheSlot<StatsDay>>,
    pub stats_weekly: Arc<CacheSlot<WeeklyStats>>,
    pub regions: Arc<CacheSlot<DailyMetrics>>,
    pub region_deceased: Arc<CacheSlot<DailyMetrics>>,
    pub patients: Arc<CacheSlot<DailyMetrics>>,
    pub hospitals: Arc<CacheSlot<DailyMetrics>>,
    pub retirement_homes: Arc<CacheSlot<DailyMetrics>>,
    pub municipalities: Arc<CacheSlot<DailyMetrics>>,
    pub health_centers: Arc<CacheSlot<DailyMetrics>>,
    pub hospitals_list: Arc<CacheSlot<Hospital>>,
    pub municipalities_list: Arc<CacheSlot<Municipality>>,
    pub retirement_homes_list: Arc<CacheSlot<RetirementHome>>,
    targets: Vec<Arc<dyn RefreshTarget>>,
}

fn daily(
    config: &CacheConfig,
    id: &str,
    file: &str,
    group_prefix: &'static str,
) -> (Arc<CacheSlot<DailyMetrics>>, Arc<dyn RefreshTarget>) {
    let slot = Arc::new(CacheSlot::new());
    let entry = ResourceEntry::new(id, config.resource_url(file), slot.clone(), move |raw| {
        parse_daily(raw, group_prefix)
    });
    (slot, Arc::new(entry))
}

fn typed<T: Send + Sync + 'static>(
    config: &CacheConfig,
    id: &str,
    file: &str,
    parse: fn(&str) -> Result<Vec<T>>,
) -> (Arc<CacheSlot<T>>, Arc<dyn RefreshTarget>) {
    let slot = Arc::new(CacheSlot::new());
    let entry = ResourceEntry::new(id, config.resource_url(file), slot.clone(), parse);
    (slot, Arc::new(entry))
}

impl Registry {
    #[must_use]
    pub fn new(config: &CacheConfig) -> Self {
        let (stats, t_stats) = typed(config, ids::STATS, "stats.csv", parse_stats);
        let (stats_weekly, t_weekly) =
            typed(config, ids::STATS_WEEKLY, "stats-weekly.csv", parse_weekly_stats);
        let (regions, t_regions) = daily(config, ids::REGIONS, "regions.csv", "region");
        let (region_deceased, t_deceased) =
            daily(config, ids::REGION_DECEASED, "region-deceased.csv", "region");
        let (patients, t_patients) = daily(config, ids::PATIENTS, "patients.csv", "facilities");
        let (hospitals, t_hospitals) = daily(config, ids::HOSPITALS, "hospitals.csv", "hospital");
        let (retirement_homes, t_rh) =
            daily(config, ids::RETIREMENT_HOMES, "retirement-homes.csv", "rh");
        let (municipalities, t_municipalities) =
            daily(config, ids::MUNICIPALITIES, "municipalities.csv", "region");
        let (health_centers, t_hc) = daily(config, ids::HEALTH_CENTERS, "health-centers.csv", "hc");
        let (hospitals_list, t_hospitals_list) = typed(
            config,
            ids::HOSPITALS_LIST,
            "dict-hospitals.csv",
            parse_directory::<Hospital>,
        );
        let (municipalities_list, t_municipalities_list) = typed(
            config,
            ids::MUNICIPALITIES_LIST,
            "dict-municipality.csv",
            parse_directory::<Municipality>,
        );
        let (retirement_homes_list, t_rh_list) = typed(
            config,
            ids::RETIREMENT_HOMES_LIST,
            "dict-retirement_homes.csv",
            parse_directory::<RetirementHome>,
        );

        Self {
            stats,
            stats_weekly,
            regions,
            region_deceased,
            patients,
            hospitals,
            retirement_homes,
            municipalities,
            health_centers,
            hospitals_list,
            municipalities_list,
            retirement_homes_list,
            targets: vec![
                t_stats,
                t_weekly,
                t_regions,
                t_deceased,
                t_patients,
                t_hospitals,
                t_rh,
                t_municipalities,
                t_hc,
                t_hospitals_list,
                t_municipalities_list,
                t_rh_list,
            ],
        }
    }

    #[must_use]
    pub fn targets(&self) -> &[Arc<dyn RefreshTarget>] {
        &self.targets
    }

    /// Resolve once every resource has been fetched at least once.
    pub async fn wait_populated(&self) {
        join_all(self.targets.iter().map(|t| t.wait_populated())).await;
    }
}
