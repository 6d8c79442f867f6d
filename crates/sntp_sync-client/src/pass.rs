// Copyright 2026 U.S. Federal Government (in countries where recognized)
// SPDX-License-Identifier: Apache-2.0

//! Bookkeeping for one pass over the server list.
//!
//! A pass visits every configured server in order. Each server gets up to
//! `max_attempts` request/timeout cycles; an accepted reply, attempt
//! exhaustion or a repeated Kiss-of-Death moves on to the next server. The
//! engine drives the transitions and performs the I/O; these types only hold
//! the state.
//!
//! Kiss-of-Death standing lives on [`ServerSlot`] and outlasts the pass:
//!
//! | Standing    | On entry                    | On Kiss-of-Death | On good reply |
//! |-------------|-----------------------------|------------------|---------------|
//! | `Good`      | queried                     | `Throttled`      | `Good`        |
//! | `Throttled` | skipped, becomes `Probation`| `Excluded`       | `Good`        |
//! | `Probation` | queried                     | `Excluded`       | `Good`        |
//! | `Excluded`  | skipped                     |                  |               |

use std::net::{IpAddr, Ipv4Addr};

use sntp_proto::protocol::NTP_ANYCAST_V4;
use sntp_proto::NtpTimestamp;

use crate::platform::PassToken;
use crate::selection::BestSelector;

/// Where the current server stands.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Phase {
    /// Waiting for the hostname lookup.
    Resolving,
    /// A request is outstanding.
    AwaitingResponse,
    /// Every server has been visited; completion is queued.
    Done,
}

/// How a server has behaved with respect to Kiss-of-Death replies.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum Standing {
    /// No outstanding Kiss-of-Death.
    #[default]
    Good,
    /// Sent a Kiss-of-Death; sits out the next pass.
    Throttled,
    /// Sat out a pass and is being queried again.
    Probation,
    /// Sent a second Kiss-of-Death. Never queried again this session.
    Excluded,
}

/// One configured server, as tracked for the whole session.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ServerSlot {
    /// Configured hostname.
    pub hostname: String,
    /// Kiss-of-Death standing.
    pub standing: Standing,
}

impl ServerSlot {
    /// A slot for `hostname` in good standing.
    pub fn new(hostname: String) -> Self {
        ServerSlot {
            hostname,
            standing: Standing::Good,
        }
    }

    /// Whether the server is queried when a pass reaches it.
    ///
    /// A throttled server is skipped once and put on probation.
    pub fn take_turn(&mut self) -> bool {
        match self.standing {
            Standing::Good | Standing::Probation => true,
            Standing::Throttled => {
                self.standing = Standing::Probation;
                false
            }
            Standing::Excluded => false,
        }
    }

    /// Record a Kiss-of-Death. Returns `true` if the server is now excluded.
    pub fn kiss_of_death(&mut self) -> bool {
        self.standing = match self.standing {
            Standing::Good => Standing::Throttled,
            _ => Standing::Excluded,
        };
        self.standing == Standing::Excluded
    }

    /// A good reply clears any Kiss-of-Death history.
    pub fn responded(&mut self) {
        if self.standing != Standing::Excluded {
            self.standing = Standing::Good;
        }
    }
}

/// State of the pass in flight.
#[derive(Debug)]
pub struct PassState {
    /// Token carried by every request of this pass.
    pub token: PassToken,
    /// Position in the server list.
    pub index: usize,
    /// Attempts left for the current server.
    pub attempts: u8,
    /// Current phase.
    pub phase: Phase,
    /// Address the current server resolved to.
    pub address: Option<IpAddr>,
    /// Transmit timestamp of the outstanding request.
    pub cookie: Option<NtpTimestamp>,
    /// Best reply seen so far.
    pub selector: BestSelector,
    max_attempts: u8,
}

impl PassState {
    /// Start a pass at the first server.
    pub fn new(token: PassToken, max_attempts: u8, last_selected: Option<usize>) -> Self {
        PassState {
            token,
            index: 0,
            attempts: max_attempts,
            phase: Phase::Resolving,
            address: None,
            cookie: None,
            selector: BestSelector::new(last_selected),
            max_attempts,
        }
    }

    /// Move to the next server with a fresh attempt budget.
    pub fn next_server(&mut self) {
        self.index += 1;
        self.attempts = self.max_attempts;
        self.address = None;
        self.cookie = None;
        self.phase = Phase::Resolving;
    }

    /// Use up one attempt. Returns `true` when none are left.
    pub fn consume_attempt(&mut self) -> bool {
        self.attempts = self.attempts.saturating_sub(1);
        self.attempts == 0
    }

    /// Give up on the current server once the outstanding attempt ends.
    pub fn exhaust(&mut self) {
        self.attempts = 0;
    }

    /// Whether a datagram from `from` can answer the outstanding request.
    ///
    /// Replies to a request sent to the NTP anycast group come from the
    /// responding server, so that address accepts any sender.
    pub fn accepts_from(&self, from: IpAddr) -> bool {
        match self.address {
            Some(addr) if addr == from => true,
            Some(IpAddr::V4(v4)) => v4 == Ipv4Addr::from(NTP_ANYCAST_V4),
            _ => false,
        }
    }
}
