// Copyright 2026 U.S. Federal Government (in countries where recognized)
// SPDX-License-Identifier: Apache-2.0

//! Best-server selection within one pass.
//!
//! Every accepted reply is offered to the [`BestSelector`]. It keeps the
//! candidate with the lowest metric (`2 * root_delay + delay`). The server
//! chosen in the previous pass gets a 25% discount on its metric, which keeps
//! the selection from flapping between servers of similar quality. Ties keep
//! the earlier candidate.

use std::net::IpAddr;

use sntp_proto::protocol::LeapIndicator;
use sntp_proto::NtpTimestamp;

use crate::estimate::DeltaEstimate;

/// Which server a result came from.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct ServerIdentity {
    /// Zero-based position in the configured server list.
    pub index: usize,
    /// Configured hostname.
    pub hostname: String,
    /// Address the reply came from.
    pub address: IpAddr,
}

/// One server's result, as retained by the selector.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct BestResult {
    /// Source of the reply.
    pub server: ServerIdentity,
    /// Offset and delay terms.
    pub estimate: DeltaEstimate,
    /// Metric used for comparison. After [`BestSelector::offer`] this is the
    /// effective (possibly discounted) metric.
    pub metric: i64,
    /// Server stratum (never 0).
    pub stratum: u8,
    /// Leap indicator carried by the reply.
    pub leap: LeapIndicator,
    /// Local UTC time at which the reply was received.
    pub captured_at: NtpTimestamp,
}

impl BestResult {
    /// Wrap an estimate, computing its undiscounted metric.
    pub fn new(
        server: ServerIdentity,
        estimate: DeltaEstimate,
        stratum: u8,
        leap: LeapIndicator,
        captured_at: NtpTimestamp,
    ) -> Self {
        BestResult {
            metric: estimate.metric(),
            server,
            estimate,
            stratum,
            leap,
            captured_at,
        }
    }
}

/// Apply the previous-winner discount: `metric - metric/4`.
pub fn biased_metric(metric: i64, same_as_last: bool) -> i64 {
    if same_as_last {
        metric - metric / 4
    } else {
        metric
    }
}

/// Retains the best result seen so far in a pass.
#[derive(Clone, Debug, Default)]
pub struct BestSelector {
    best: Option<BestResult>,
    last_selected: Option<usize>,
}

impl BestSelector {
    /// Start a pass. `last_selected` is the list index chosen by the previous
    /// completed pass, if any.
    pub fn new(last_selected: Option<usize>) -> Self {
        BestSelector {
            best: None,
            last_selected,
        }
    }

    /// Offer a candidate. Returns `true` if it replaced the retained best.
    ///
    /// Stratum-0 candidates are never retained.
    pub fn offer(&mut self, mut candidate: BestResult) -> bool {
        if candidate.stratum == 0 {
            return false;
        }
        let same_as_last = self.last_selected == Some(candidate.server.index);
        candidate.metric = biased_metric(candidate.metric, same_as_last);

        let replace = match &self.best {
            None => true,
            Some(best) => candidate.metric < best.metric,
        };
        if replace {
            self.best = Some(candidate);
        }
        replace
    }

    /// The retained best, if any reply has been accepted.
    pub fn best(&self) -> Option<&BestResult> {
        self.best.as_ref()
    }

    /// Consume the selector, yielding the retained best.
    pub fn into_best(self) -> Option<BestResult> {
        self.best
    }
}
