use super::RecordMapper;
use crate::error::{MigrationError, Result};
use crate::models::{ConsolidationOrder, SourceRecordId, TargetChildLink, TargetConsolidation};
use std::collections::HashSet;
use uuid::Uuid;

/// Default mapper: one link per distinct child case, ordered by order date
#[derive(Debug, Clone, Default)]
pub struct ConsolidationOrderMapper;

impl RecordMapper for ConsolidationOrderMapper {
    fn map(
        &self,
        target_id: Uuid,
        source_id: &SourceRecordId,
        order: &ConsolidationOrder,
    ) -> Result<TargetConsolidation> {
        if order.lead_case_id.trim().is_empty() {
            return Err(MigrationError::permanent(
                source_id.as_str(),
                "consolidation order has no lead case id",
            ));
        }

        let mut seen = HashSet::new();
        let mut child_cases: Vec<TargetChildLink> = order
            .child_cases
            .iter()
            .filter(|child| child.case_id != order.lead_case_id)
            .filter(|child| seen.insert(child.case_id.clone()))
            .map(|child| TargetChildLink {
                case_id: child.case_id.clone(),
                consolidation_type: child.consolidation_type,
                order_date: child.consolidation_date,
            })
            .collect();
        child_cases.sort_by(|a, b| {
            a.order_date
                .cmp(&b.order_date)
                .then_with(|| a.case_id.cmp(&b.case_id))
        });

        Ok(TargetConsolidation {
            target_id,
            source_id: source_id.clone(),
            lead_case_id: order.lead_case_id.clone(),
            child_cases,
        })
    }
}
