//! Text rendering of the hierarchy.

use std::collections::HashMap;

use termtree::Tree;

use crate::domain::entities::{Employee, EmployeeId};
use crate::domain::error::{DomainError, DomainResult};
use crate::domain::roster::Roster;

/// Label shown for one employee in the tree view.
pub fn node_label(employee: &Employee) -> String {
    match (employee.position.is_empty(), employee.department.is_empty()) {
        (true, true) => format!("{} [{}]", employee.name, employee.id),
        (false, true) => format!("{} - {} [{}]", employee.name, employee.position, employee.id),
        (true, false) => format!("{} ({}) [{}]", employee.name, employee.department, employee.id),
        (false, false) => format!(
            "{} - {} ({}) [{}]",
            employee.name, employee.position, employee.department, employee.id
        ),
    }
}

/// Build the subtree rooted at `root` bottom-up, without recursion.
pub fn render_subtree(roster: &Roster, root: EmployeeId) -> DomainResult<Tree<String>> {
    let descendants = roster.descendants(root)?;
    let mut built: HashMap<EmployeeId, Tree<String>> =
        HashMap::with_capacity(descendants.len() + 1);

    // breadth-first order reversed: every child is built before its manager
    for employee in descendants.iter().rev() {
        let leaves = take_children(roster, &mut built, employee.id);
        built.insert(employee.id, Tree::new(node_label(employee)).with_leaves(leaves));
    }

    let top = roster.get(root).ok_or(DomainError::NotFound(root))?;
    let leaves = take_children(roster, &mut built, root);
    Ok(Tree::new(node_label(top)).with_leaves(leaves))
}

/// One tree per root, in id order.
pub fn render_forest(roster: &Roster) -> DomainResult<Vec<Tree<String>>> {
    roster
        .roots()
        .into_iter()
        .map(|root| render_subtree(roster, root.id))
        .collect()
}

fn take_children(
    roster: &Roster,
    built: &mut HashMap<EmployeeId, Tree<String>>,
    id: EmployeeId,
) -> Vec<Tree<String>> {
    roster
        .children(id)
        .into_iter()
        .filter_map(|child| built.remove(&child.id))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::EmployeeDraft;

    #[test]
    fn given_two_level_roster_when_rendering_then_nests_reports() {
        let mut roster = Roster::new();
        let ceo = roster.add(EmployeeDraft::new("John Smith").position("CEO")).unwrap();
        roster
            .add(EmployeeDraft::new("Sarah Johnson").position("CTO").manager(ceo.id))
            .unwrap();
        roster.add(EmployeeDraft::new("Contractor")).unwrap();

        let trees = render_forest(&roster).unwrap();

        assert_eq!(trees.len(), 2);
        let rendered = trees[0].to_string();
        assert!(rendered.starts_with("John Smith - CEO [1]"));
        assert!(rendered.contains("└── Sarah Johnson - CTO [2]"));
        assert_eq!(trees[1].to_string().trim_end(), "Contractor [3]");
    }
}
