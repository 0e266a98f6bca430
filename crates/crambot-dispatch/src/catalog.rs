// SPDX-FileCopyrightText: 2026 Crambot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The fixed set of intents the gateway understands and where each one goes.

use crambot_core::types::BusinessModule;

/// How an intent is handled once classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntentKind {
    /// Read-only; executed immediately.
    Query,
    /// Mutating; requires confirmation first.
    Write,
    /// `system.*`; handled as a command.
    System,
    Unknown,
}

/// Downstream endpoint of a bot-scope intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Route {
    pub module: BusinessModule,
    pub path: &'static str,
}

pub const QUERY_INTENTS: &[&str] = &[
    "inclass.query_list",
    "inclass.query_report",
    "manage.query_student",
    "manage.query_finance",
    "manage.query_history",
    "stock.query",
    "stock.query_history",
];

pub const WRITE_INTENTS: &[&str] = &[
    "inclass.leave",
    "inclass.late",
    "inclass.checkin",
    "manage.payment",
    "manage.add_student",
    "stock.ship",
    "stock.restock",
];

const ROUTES: &[(&str, BusinessModule, &str)] = &[
    ("inclass.leave", BusinessModule::Inclass, "/attendance/leave"),
    ("inclass.late", BusinessModule::Inclass, "/attendance/late"),
    ("inclass.checkin", BusinessModule::Inclass, "/attendance/checkin"),
    ("inclass.query_list", BusinessModule::Inclass, "/attendance/list"),
    ("inclass.query_report", BusinessModule::Inclass, "/attendance/report"),
    ("manage.payment", BusinessModule::Manage, "/finance/payment"),
    ("manage.add_student", BusinessModule::Manage, "/student/create"),
    ("manage.query_student", BusinessModule::Manage, "/student/search"),
    ("manage.query_finance", BusinessModule::Manage, "/finance/summary"),
    ("manage.query_history", BusinessModule::Manage, "/finance/history"),
    ("stock.ship", BusinessModule::Stock, "/stock/ship"),
    ("stock.restock", BusinessModule::Stock, "/stock/restock"),
    ("stock.query", BusinessModule::Stock, "/stock/check"),
    ("stock.query_history", BusinessModule::Stock, "/stock/history"),
];

const LABELS: &[(&str, &str)] = &[
    ("inclass.leave", "登記請假"),
    ("inclass.late", "登記遲到"),
    ("inclass.checkin", "登記到班"),
    ("manage.payment", "登記繳費"),
    ("manage.add_student", "新增學生"),
    ("stock.ship", "出貨（減庫存）"),
    ("stock.restock", "進貨（加庫存）"),
];

pub const SYSTEM_SWITCH: &str = "system.switch";
pub const SYSTEM_HELP: &str = "system.help";
pub const SYSTEM_SYNC: &str = "system.sync";

/// Intents of the parent persona.
pub mod parent {
    pub const LEAVE: &str = "parent.leave";
    pub const ATTENDANCE: &str = "parent.attendance";
    pub const PAYMENTS: &str = "parent.payments";
    pub const SCHEDULE: &str = "parent.schedule";
    pub const HELP: &str = "parent.help";
}

pub fn kind_of(intent: &str) -> IntentKind {
    if QUERY_INTENTS.contains(&intent) {
        IntentKind::Query
    } else if WRITE_INTENTS.contains(&intent) {
        IntentKind::Write
    } else if intent.starts_with("system.") {
        IntentKind::System
    } else {
        IntentKind::Unknown
    }
}

pub fn route(intent: &str) -> Option<Route> {
    ROUTES
        .iter()
        .find(|(name, _, _)| *name == intent)
        .map(|(_, module, path)| Route {
            module: *module,
            path,
        })
}

/// Human label shown in confirmation prompts. Falls back to the intent name.
pub fn label(intent: &str) -> &str {
    LABELS
        .iter()
        .find(|(name, _)| *name == intent)
        .map(|(_, label)| *label)
        .unwrap_or(intent)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_query_and_write_intent_has_a_route() {
        for intent in QUERY_INTENTS.iter().chain(WRITE_INTENTS) {
            assert!(route(intent).is_some(), "{intent} has no route");
        }
        assert_eq!(ROUTES.len(), QUERY_INTENTS.len() + WRITE_INTENTS.len());
    }

    #[test]
    fn kinds_are_disjoint() {
        assert_eq!(kind_of("inclass.leave"), IntentKind::Write);
        assert_eq!(kind_of("stock.query"), IntentKind::Query);
        assert_eq!(kind_of("system.switch"), IntentKind::System);
        assert_eq!(kind_of("unknown"), IntentKind::Unknown);
        assert_eq!(kind_of("parent.leave"), IntentKind::Unknown);
    }

    #[test]
    fn leave_routes_to_inclass() {
        let r = route("inclass.leave").unwrap();
        assert_eq!(r.module, BusinessModule::Inclass);
        assert_eq!(r.path, "/attendance/leave");
        assert_eq!(route("manage.add_student").unwrap().path, "/student/create");
    }

    #[test]
    fn labels_fall_back_to_intent_name() {
        assert_eq!(label("manage.payment"), "登記繳費");
        assert_eq!(label("stock.query"), "stock.query");
    }
}
