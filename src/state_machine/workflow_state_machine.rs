use super::{
    errors::{StateMachineError, StateMachineResult},
    events::WorkflowEvent,
    states::{WorkflowKind, WorkflowState},
};
use crate::logging::log_workflow_transition;

/// In-memory lifecycle tracker for one orchestration instance.
///
/// Lives inside the orchestrator body, so it is rebuilt on every replay and holds no
/// state the history does not already determine.
#[derive(Debug, Clone)]
pub struct WorkflowStateMachine {
    instance_id: String,
    kind: WorkflowKind,
    state: WorkflowState,
    transitions: Vec<(WorkflowState, WorkflowState)>,
}

impl WorkflowStateMachine {
    pub fn new(instance_id: impl Into<String>, kind: WorkflowKind) -> Self {
        Self {
            instance_id: instance_id.into(),
            kind,
            state: WorkflowState::Start,
            transitions: Vec::new(),
        }
    }

    pub fn current_state(&self) -> WorkflowState {
        self.state
    }

    pub fn kind(&self) -> WorkflowKind {
        self.kind
    }

    /// Every transition taken so far, in order
    pub fn transitions(&self) -> &[(WorkflowState, WorkflowState)] {
        &self.transitions
    }

    /// Attempt to transition the workflow state
    pub fn transition(&mut self, event: WorkflowEvent) -> StateMachineResult<WorkflowState> {
        let from = self.state;
        let target = self.determine_target_state(from, &event)?;

        self.state = target;
        self.transitions.push((from, target));
        log_workflow_transition(
            &self.instance_id,
            &self.kind.to_string(),
            &from.to_string(),
            &target.to_string(),
            event.error_message(),
        );

        Ok(target)
    }

    /// Determine the target state based on current state and event
    fn determine_target_state(
        &self,
        current_state: WorkflowState,
        event: &WorkflowEvent,
    ) -> StateMachineResult<WorkflowState> {
        let discovery = self.kind.discovery_state();

        let target = match (current_state, event) {
            (WorkflowState::Start, WorkflowEvent::Start) => discovery,

            // Nothing to fan out over
            (state, WorkflowEvent::Discovered(0)) if state == discovery => WorkflowState::Done,
            (state, WorkflowEvent::Discovered(_)) if state == discovery => WorkflowState::FanningOut,

            (WorkflowState::FanningOut, WorkflowEvent::FannedOut) => WorkflowState::Awaiting,
            (WorkflowState::Awaiting, WorkflowEvent::Settled) => WorkflowState::Done,

            (state, WorkflowEvent::Fail(_)) if !state.is_terminal() => WorkflowState::Failed,
            (state, WorkflowEvent::Cancel) if !state.is_terminal() => WorkflowState::Cancelled,

            (from_state, _) => {
                return Err(StateMachineError::InvalidTransition {
                    instance_id: self.instance_id.clone(),
                    from: from_state.to_string(),
                    event: event.event_type().to_string(),
                })
            }
        };

        Ok(target)
    }

    /// Check if the workflow is in a terminal state
    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paging_happy_path() {
        let mut machine = WorkflowStateMachine::new("run:081:11", WorkflowKind::Paging);
        assert_eq!(
            machine.transition(WorkflowEvent::Start).unwrap(),
            WorkflowState::DiscoveringPageCount
        );
        assert_eq!(
            machine.transition(WorkflowEvent::Discovered(3)).unwrap(),
            WorkflowState::FanningOut
        );
        machine.transition(WorkflowEvent::FannedOut).unwrap();
        assert_eq!(
            machine.transition(WorkflowEvent::Settled).unwrap(),
            WorkflowState::Done
        );
        assert_eq!(machine.transitions().len(), 4);
    }

    #[test]
    fn test_zero_pages_short_circuits_to_done() {
        let mut machine = WorkflowStateMachine::new("run:081:15", WorkflowKind::Paging);
        machine.transition(WorkflowEvent::Start).unwrap();
        assert_eq!(
            machine.transition(WorkflowEvent::Discovered(0)).unwrap(),
            WorkflowState::Done
        );
        assert!(machine.is_terminal());
    }

    #[test]
    fn test_discovery_state_depends_on_kind() {
        let mut etl = WorkflowStateMachine::new("run:081:11:1", WorkflowKind::Etl);
        assert_eq!(
            etl.transition(WorkflowEvent::Start).unwrap(),
            WorkflowState::FetchingIds
        );

        let mut root = WorkflowStateMachine::new("run", WorkflowKind::Root);
        assert_eq!(
            root.transition(WorkflowEvent::Start).unwrap(),
            WorkflowState::Partitioning
        );
    }

    #[test]
    fn test_invalid_transitions_are_rejected() {
        let mut machine = WorkflowStateMachine::new("run", WorkflowKind::Root);
        assert!(machine.transition(WorkflowEvent::Settled).is_err());

        machine.transition(WorkflowEvent::Start).unwrap();
        machine.transition(WorkflowEvent::Cancel).unwrap();
        assert_eq!(machine.current_state(), WorkflowState::Cancelled);
        assert!(machine.transition(WorkflowEvent::Fail("late".into())).is_err());
    }
}
