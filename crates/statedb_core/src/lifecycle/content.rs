//! Static bootstrap content seeded into a freshly created state partition.

/// Access condition granting actions to the partition's governing contract.
pub const MAIN_CONDITION: &str = "ContractConditions(\"MainCondition\")";

/// Source of the default governing contract.
///
/// The contract gates privileged actions on the partition's governing
/// account.
pub const DEFAULT_CONTRACT: &str = r#"contract MainCondition {
    data {}
    conditions {
        if (StateVal("gov_account") != $member) {
            warning "Sorry, you don't have access to this action."
        }
    }
    action {}
}"#;

/// Name of the default dashboard page.
pub const DASHBOARD_PAGE_NAME: &str = "dashboard_default";

/// Markup of the default dashboard page.
pub const DASHBOARD_PAGE: &str = r#"Title: Dashboard
Divs: col-md-8
    P(h4, Welcome)
    P(text-left, "Your state has been created. Install the basic apps to get started.")
DivsEnd:
PageEnd:
"#;

/// Name of the administration page.
pub const GOVERNMENT_PAGE_NAME: &str = "government";

/// Markup of the administration page.
pub const GOVERNMENT_PAGE: &str = r#"Title: Administration
Divs: col-md-8
    P(h4, Administration)
    P(text-left, "Tables, contracts, interface and language management.")
DivsEnd:
PageEnd:
"#;

/// Name of the default menu.
pub const DEFAULT_MENU_NAME: &str = "menu_default";

/// Entries of the default menu.
pub const DEFAULT_MENU: &str = "MenuItem(Dashboard, dashboard_default)
MenuItem(Administration, government)";

/// Name of the administration menu.
pub const GOVERNMENT_MENU_NAME: &str = "government";

/// Entries of the administration menu.
pub const GOVERNMENT_MENU: &str = "MenuItem(Member dashboard, dashboard_default)
MenuItem(Administration, government)
MenuGroup(Admin tools, admin)
MenuItem(Tables, sys-tables)
MenuItem(Contracts, sys-contracts)
MenuItem(Interface, sys-interface)
MenuItem(Languages, sys-languages)
MenuItem(Signatures, sys-signatures)
MenuEnd:
MenuBack(Welcome)";

/// Default language entries: (code, display name).
pub const DEFAULT_LANGUAGES: [(&str, &str); 3] =
    [("en", "English"), ("de", "Deutsch"), ("fr", "Français")];
