//! Tick-driven reconciliation of zone A records against the dynamic DNS address.
//!
//! One tick resolves the dynamic DNS hostname once, then walks the configured
//! zones in order: fetch the record set, compare its first address with the
//! resolved one, and rewrite it with a conditional (etag) update when they
//! differ. Nothing is carried over between ticks.

use crate::config::Config;
use crate::error::{Error, Result};
use crate::providers::{ZoneRecordAccessor, ZoneRef};
use crate::resolver::AddressResolver;
use crate::schedule::{ScheduleExpression, ScheduleProvider, TickInfo};
use std::net::Ipv4Addr;
use tracing::{debug, error, info, warn};

/// Everything the reconciler needs to know, fixed at construction.
#[derive(Debug, Clone)]
pub struct ReconcilerSettings {
    /// Hostname whose address is authoritative.
    pub domain: String,
    /// Record set name reconciled in every zone.
    pub record_set_name: String,
    /// Zones, processed in order.
    pub zones: Vec<ZoneRef>,
    /// Active schedule, logged at the start of each tick.
    pub schedule: ScheduleExpression,
}

impl ReconcilerSettings {
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self {
            domain: config.dynamic_dns_domain.clone(),
            record_set_name: config.record_set_name.clone(),
            zones: config.zone_refs(),
            schedule: ScheduleProvider::from_config(config).current_schedule()?,
        })
    }
}

/// Result of reconciling one zone.
#[derive(Debug)]
pub enum ZoneOutcome {
    /// The record already held the resolved address.
    Unchanged { address: Ipv4Addr },
    /// The record set was rewritten.
    Updated {
        previous: Option<String>,
        current: Ipv4Addr,
    },
    /// The zone could not be reconciled this tick.
    Failed(Error),
}

#[derive(Debug)]
pub struct ZoneReport {
    pub zone: ZoneRef,
    pub outcome: ZoneOutcome,
}

/// What a tick did.
#[derive(Debug)]
pub enum TickReport {
    /// No zones are configured; nothing was contacted.
    NoZones,
    /// The domain did not resolve; no zone was contacted.
    ResolutionFailed(Error),
    /// Zones were processed. `aborted` is set when an authorization failure
    /// stopped the tick before every zone was visited.
    Completed {
        address: Ipv4Addr,
        zones: Vec<ZoneReport>,
        aborted: bool,
    },
}

impl TickReport {
    /// Number of zones whose record set was rewritten.
    pub fn updated(&self) -> usize {
        self.count(|o| matches!(o, ZoneOutcome::Updated { .. }))
    }

    /// Number of zones that were already current.
    pub fn unchanged(&self) -> usize {
        self.count(|o| matches!(o, ZoneOutcome::Unchanged { .. }))
    }

    /// Number of zones that failed.
    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, ZoneOutcome::Failed(_)))
    }

    /// True when every configured zone ended up current.
    pub fn is_success(&self) -> bool {
        match self {
            TickReport::Completed { aborted, .. } => !aborted && self.failed() == 0,
            _ => false,
        }
    }

    fn count<F>(&self, predicate: F) -> usize
    where
        F: Fn(&ZoneOutcome) -> bool,
    {
        match self {
            TickReport::Completed { zones, .. } => {
                zones.iter().filter(|z| predicate(&z.outcome)).count()
            }
            _ => 0,
        }
    }
}

/// Drives one reconciliation pass per tick.
pub struct Reconciler {
    settings: ReconcilerSettings,
    resolver: Box<dyn AddressResolver>,
    accessor: Box<dyn ZoneRecordAccessor>,
}

impl Reconciler {
    pub fn new(
        settings: ReconcilerSettings,
        resolver: Box<dyn AddressResolver>,
        accessor: Box<dyn ZoneRecordAccessor>,
    ) -> Self {
        Self {
            settings,
            resolver,
            accessor,
        }
    }

    pub fn settings(&self) -> &ReconcilerSettings {
        &self.settings
    }

    /// Run one tick. Never fails: every error is logged and reported.
    pub async fn run_once(&self, tick: &TickInfo) -> TickReport {
        info!(
            schedule = %self.settings.schedule,
            fired_at = %tick.fired_at,
            "Reconciliation tick started"
        );
        if let Some(next) = tick.next {
            info!(next = %next, "Next tick scheduled");
        }
        if tick.is_past_due {
            warn!(last = ?tick.last, "Tick is running late");
        }

        if self.settings.zones.is_empty() {
            error!("No DNS zone names configured, nothing to reconcile");
            return TickReport::NoZones;
        }

        let address = match self.resolver.resolve(&self.settings.domain).await {
            Ok(address) => address,
            Err(e) => {
                error!(domain = %self.settings.domain, error = %e, "Failed to resolve IP address for domain");
                return TickReport::ResolutionFailed(e);
            }
        };

        info!(domain = %self.settings.domain, ip = %address, "Resolved dynamic DNS domain");

        let report = self.reconcile(address).await;
        info!(
            updated = report.updated(),
            unchanged = report.unchanged(),
            failed = report.failed(),
            "Reconciliation tick finished"
        );
        report
    }

    /// Reconcile every configured zone against an already resolved address.
    pub async fn reconcile(&self, address: Ipv4Addr) -> TickReport {
        let mut zones = Vec::with_capacity(self.settings.zones.len());
        let mut aborted = false;

        for zone in &self.settings.zones {
            let outcome = match self.reconcile_zone(zone, address).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    if e.is_conflict() {
                        warn!(zone = %zone, record = %self.settings.record_set_name, error = %e,
                            "Record set changed concurrently, leaving it for the next tick");
                    } else {
                        error!(zone = %zone, record = %self.settings.record_set_name, error = %e,
                            "Failed to reconcile zone");
                    }
                    aborted = e.is_fatal_for_tick();
                    ZoneOutcome::Failed(e)
                }
            };

            zones.push(ZoneReport {
                zone: zone.clone(),
                outcome,
            });

            if aborted {
                error!("Credentials rejected, skipping remaining zones this tick");
                break;
            }
        }

        TickReport::Completed {
            address,
            zones,
            aborted,
        }
    }

    async fn reconcile_zone(&self, zone: &ZoneRef, address: Ipv4Addr) -> Result<ZoneOutcome> {
        let record_name = self.settings.record_set_name.as_str();
        let mut record_set = self.accessor.fetch(zone, record_name).await?;

        if record_set.a_records.is_empty() {
            return Err(Error::EmptyRecordSet {
                zone: zone.zone_name.clone(),
                record: record_name.to_string(),
            });
        }

        let current = record_set.first_address();
        let resolved = address.to_string();
        debug!(zone = %zone, record = record_name, current = ?current, etag = %record_set.etag, "Fetched record set");

        if current.as_deref() == Some(resolved.as_str()) {
            info!(zone = %zone, record = record_name, ip = %address, "No IP address change detected, nothing to do");
            return Ok(ZoneOutcome::Unchanged { address });
        }

        info!(
            zone = %zone,
            record = record_name,
            previous = current.as_deref().unwrap_or("-"),
            ip = %address,
            "IP address change detected, updating record set"
        );

        let etag = record_set.etag.clone();
        record_set.replace_addresses(address);
        self.accessor
            .update(zone, record_name, &record_set, &etag)
            .await?;

        info!(zone = %zone, record = record_name, ip = %address, "Record set updated");

        Ok(ZoneOutcome::Updated {
            previous: current,
            current: address,
        })
    }
}
