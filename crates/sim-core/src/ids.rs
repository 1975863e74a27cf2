//! String identifiers for persisted entities.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! string_id {
    ($($(#[$meta:meta])* $name:ident;)+) => {
        $(
            $(#[$meta])*
            #[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
            #[serde(transparent)]
            pub struct $name(pub String);

            impl $name {
                pub fn new(id: impl Into<String>) -> Self {
                    Self(id.into())
                }

                pub fn as_str(&self) -> &str {
                    &self.0
                }
            }

            impl fmt::Display for $name {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    f.write_str(&self.0)
                }
            }

            impl From<&str> for $name {
                fn from(s: &str) -> Self {
                    Self(s.to_string())
                }
            }
        )+
    };
}

string_id! {
    /// World instance identifier; also the root of every RNG seed.
    WorldId;
    SectorId;
    NicheId;
    HoldingId;
    BotId;
    CompanyId;
    PlayerId;
    LoanId;
    ProgramId;
    /// Catalog upgrade identifier (a `NicheUpgrade`).
    UpgradeId;
    DecisionId;
    EventId;
}
