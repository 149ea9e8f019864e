//! Shared type definitions for the Tally analytics event logger.
//!
//! This crate is the single source of truth for the shapes that flow
//! between the storage layer and its callers. Types defined here flow
//! downstream to `TypeScript` via `ts-rs` for dashboards that render counts.
//!
//! # Modules
//!
//! - [`ids`] -- Time-ordered, lexically sortable event identifiers
//! - [`enums`] -- Filterable columns, comparison operators, grouping modes
//! - [`filter`] -- Structured filter expressions over events
//! - [`structs`] -- Events, queries, count results, and cohort records
//! - [`time`] -- Timestamp layout shared by storage and filters

pub mod enums;
pub mod filter;
pub mod ids;
pub mod structs;
pub mod time;

// Re-export all public types at crate root for convenience.
pub use enums::{CompareOp, EventColumn, GroupBy};
pub use filter::{Filter, FilterValue};
pub use ids::EventId;
pub use structs::{
    CohortRecord, CohortStateCount, CohortUpdate, CountQuery, Event, EventCount, GroupCount,
    ListQuery, NewEvent, UserAgentInfo, VISIT,
};

#[cfg(test)]
mod tests {
    //! `TypeScript` binding generation for the exported types.

    #[test]
    fn export_bindings() {
        // ts-rs generates TypeScript bindings when types with
        // #[ts(export)] are used. The files are written to the
        // `bindings/` directory relative to the crate root.
        use ts_rs::TS;

        let _ = crate::ids::EventId::export_all();

        let _ = crate::enums::EventColumn::export_all();
        let _ = crate::enums::GroupBy::export_all();

        let _ = crate::structs::UserAgentInfo::export_all();
        let _ = crate::structs::Event::export_all();
        let _ = crate::structs::GroupCount::export_all();
        let _ = crate::structs::EventCount::export_all();
        let _ = crate::structs::CohortRecord::export_all();
        let _ = crate::structs::CohortStateCount::export_all();
    }
}
