use std::fmt;

/// Where a query is dispatched after the full-listing check.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Route {
    SpecificVehicle,
    InventorySearch,
    FordExpert,
    CustomerRelations,
    FollowUp,
    ShowForm,
}

impl Route {
    pub const ALL: [Route; 6] = [
        Route::SpecificVehicle,
        Route::InventorySearch,
        Route::FordExpert,
        Route::CustomerRelations,
        Route::FollowUp,
        Route::ShowForm,
    ];

    /// Labels offered to the intent classifier, in the same order as [`Route::ALL`].
    pub const LABELS: [&'static str; 6] = [
        "Specific Vehicle",
        "Inventory Search",
        "Ford Expert",
        "Customer Relations",
        "Follow-up",
        "Show Form",
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::SpecificVehicle => "Specific Vehicle",
            Self::InventorySearch => "Inventory Search",
            Self::FordExpert => "Ford Expert",
            Self::CustomerRelations => "Customer Relations",
            Self::FollowUp => "Follow-up",
            Self::ShowForm => "Show Form",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|route| route.label().eq_ignore_ascii_case(label.trim()))
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
