//! Treatment recommendations.

use serde::{Deserialize, Serialize};

use crate::catalog::{Catalog, CatalogEntry, CostRange, TreatmentKind};
use crate::detect::{DiseaseFinding, Finding, PestFinding};
use crate::types::Priority;

/// One action to take, deduplicated by `(type, target)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    #[serde(rename = "type")]
    pub kind: TreatmentKind,
    pub target: String,
    pub priority: Priority,
    pub action: String,
    pub timing: String,
    pub cost_estimate_range: Option<CostRange>,
}

/// Builds recommendations from findings using the catalog's templates
/// and cost table.
#[derive(Debug, Clone, Copy)]
pub struct RecommendationEngine<'a> {
    catalog: &'a Catalog,
}

impl<'a> RecommendationEngine<'a> {
    #[must_use]
    pub const fn new(catalog: &'a Catalog) -> Self {
        Self { catalog }
    }

    /// One recommendation per `(type, target)`, at the highest priority
    /// any contributing finding implies, highest priority first.
    ///
    /// Findings whose name is not in the catalog are skipped.
    #[must_use]
    pub fn recommend(
        &self,
        pests: &[PestFinding],
        diseases: &[DiseaseFinding],
    ) -> Vec<Recommendation> {
        let pest_entries = pests
            .iter()
            .filter_map(|f| self.catalog.pest(&f.name).map(|e| (e, f as &dyn Finding)));
        let disease_entries = diseases
            .iter()
            .filter_map(|f| self.catalog.disease(&f.name).map(|e| (e, f as &dyn Finding)));

        let mut recommendations: Vec<Recommendation> = Vec::new();
        for (entry, finding) in pest_entries.chain(disease_entries) {
            let priority = finding.severity().priority();
            let template = &entry.recommendation;
            let target = entry.target();

            if let Some(existing) = recommendations
                .iter_mut()
                .find(|r| r.kind == template.kind && r.target.eq_ignore_ascii_case(target))
            {
                existing.priority = existing.priority.max(priority);
                continue;
            }
            recommendations.push(self.build(entry, priority));
        }

        // Stable: equal priorities keep finding order.
        recommendations.sort_by(|a, b| b.priority.cmp(&a.priority));
        recommendations
    }

    fn build(&self, entry: &CatalogEntry, priority: Priority) -> Recommendation {
        let template = &entry.recommendation;
        Recommendation {
            kind: template.kind,
            target: entry.target().to_string(),
            priority,
            action: template.action.clone(),
            timing: template.kind.timing().to_string(),
            cost_estimate_range: self.catalog.costs.get(entry.target()).cloned(),
        }
    }
}
