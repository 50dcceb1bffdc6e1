// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use sigv4a_core::time::{format_date, DateTime};
use sigv4a_core::{Error, Result};

use crate::constants::SCOPE_TERMINATOR;

/// RegionSet is the set of regions a signature is valid against.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RegionSet {
    /// Wildcard `*`: valid against every region of the service.
    Any,
    /// A non-empty ordered list of distinct region ids.
    Regions(Vec<String>),
}

impl RegionSet {
    /// Build a region set from a list of region ids.
    ///
    /// Duplicates are dropped while keeping the first occurrence. A `*`
    /// anywhere in the list turns the set into the wildcard.
    pub fn new<I, S>(regions: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set: Vec<String> = Vec::new();
        for region in regions {
            let region = region.as_ref().trim();
            if region == "*" {
                return Ok(RegionSet::Any);
            }
            if region.is_empty() {
                return Err(Error::config_invalid("region id must not be empty"));
            }
            if region.contains('/') {
                return Err(Error::config_invalid(format!(
                    "region id must not contain '/': {region}"
                )));
            }
            if !set.iter().any(|r| r == region) {
                set.push(region.to_string());
            }
        }

        if set.is_empty() {
            return Err(Error::config_invalid("region set must not be empty"));
        }
        Ok(RegionSet::Regions(set))
    }

    /// Check whether a signature scoped to this set may be verified at `region`.
    pub fn contains(&self, region: &str) -> bool {
        match self {
            RegionSet::Any => true,
            RegionSet::Regions(regions) => regions.iter().any(|r| r == region),
        }
    }

    /// Returns true for the wildcard set.
    pub fn is_any(&self) -> bool {
        matches!(self, RegionSet::Any)
    }
}

impl FromStr for RegionSet {
    type Err = Error;

    /// Parse `*` or a comma separated list like `us-east-1,us-west-2`.
    fn from_str(s: &str) -> Result<Self> {
        RegionSet::new(s.split(','))
    }
}

impl Display for RegionSet {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            RegionSet::Any => f.write_str("*"),
            RegionSet::Regions(regions) => f.write_str(&regions.join(",")),
        }
    }
}

/// Scope binds a signature to a day, a region set and a service.
///
/// Rendered as `20150830/us-east-1,us-west-2/service/aws4_request`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scope {
    date: String,
    region_set: RegionSet,
    service: String,
}

impl Scope {
    /// Build the scope for the signing time.
    pub fn new(time: DateTime, region_set: &RegionSet, service: &str) -> Self {
        Self {
            date: format_date(time),
            region_set: region_set.clone(),
            service: service.to_string(),
        }
    }

    /// Parse a rendered scope back into its parts.
    pub fn parse(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.split('/').collect();
        let [date, region_set, service, terminator] = parts.as_slice() else {
            return Err(Error::request_invalid(format!("malformed scope: {s}")));
        };
        if *terminator != SCOPE_TERMINATOR {
            return Err(Error::request_invalid(format!(
                "scope must end with {SCOPE_TERMINATOR}: {s}"
            )));
        }
        if date.len() != 8 || !date.bytes().all(|b| b.is_ascii_digit()) {
            return Err(Error::request_invalid(format!(
                "scope date must be YYYYMMDD: {s}"
            )));
        }
        if service.is_empty() {
            return Err(Error::request_invalid(format!("scope without service: {s}")));
        }

        Ok(Self {
            date: date.to_string(),
            region_set: region_set.parse()?,
            service: service.to_string(),
        })
    }

    /// The scope date in `YYYYMMDD`.
    pub fn date(&self) -> &str {
        &self.date
    }

    /// The region set this scope covers.
    pub fn region_set(&self) -> &RegionSet {
        &self.region_set
    }

    /// The service name.
    pub fn service(&self) -> &str {
        &self.service
    }
}

impl Display for Scope {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}",
            self.date, self.region_set, self.service, SCOPE_TERMINATOR
        )
    }
}
