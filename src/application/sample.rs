//! Sample organization used to seed an empty store.

use crate::domain::{Employee, EmployeeDraft, EmployeeId};

const NAMES: [&str; 20] = [
    "John Smith",
    "Sarah Johnson",
    "Mike Davis",
    "Lisa Chen",
    "David Wilson",
    "Emma Wilson",
    "James Brown",
    "Sophia Davis",
    "Michael Johnson",
    "Olivia Garcia",
    "Daniel Miller",
    "Ava Rodriguez",
    "Christopher Martinez",
    "Isabella Anderson",
    "Matthew Taylor",
    "Mia Thomas",
    "Andrew Jackson",
    "Charlotte White",
    "Joshua Harris",
    "Amelia Martin",
];

// (position, department, manager)
const EXECUTIVES: [(&str, &str, Option<u64>); 8] = [
    ("CEO", "Executive", None),
    ("CTO", "Technology", Some(1)),
    ("CFO", "Finance", Some(1)),
    ("COO", "Operations", Some(1)),
    ("VP of Engineering", "Technology", Some(2)),
    ("VP of Marketing", "Marketing", Some(2)),
    ("VP of Sales", "Sales", Some(3)),
    ("VP of HR", "Human Resources", Some(4)),
];

const STAFF: [(&str, &str); 12] = [
    ("Senior Software Engineer", "Engineering"),
    ("Marketing Specialist", "Marketing"),
    ("Account Executive", "Sales"),
    ("Recruiter", "Human Resources"),
    ("Financial Analyst", "Finance"),
    ("Operations Specialist", "Operations"),
    ("DevOps Engineer", "Technology"),
    ("Product Manager", "Product"),
    ("UX Designer", "Design"),
    ("Sales Representative", "Sales"),
    ("Legal Counsel", "Legal"),
    ("Software Engineer", "Engineering"),
];

/// Manager for staff of a department; departments without a VP report to the CEO.
fn department_head(department: &str) -> u64 {
    match department {
        "Technology" | "Engineering" => 5,
        "Marketing" => 6,
        "Sales" => 7,
        "Human Resources" => 8,
        "Finance" => 3,
        "Operations" => 4,
        _ => 1,
    }
}

fn email(name: &str) -> String {
    format!("{}@company.com", name.to_lowercase().replacen(' ', ".", 1))
}

fn phone(id: u64) -> String {
    format!("+1-555-{:03}-{:04}", 100 + id, 1000 + id)
}

/// Deterministic sample organization: a CEO, three C-level executives, four
/// VPs and twelve staff members. Always a valid single-root forest.
pub fn generate() -> Vec<Employee> {
    let roles = EXECUTIVES.iter().copied().chain(
        STAFF.iter().map(|&(position, department)| {
            (position, department, Some(department_head(department)))
        }),
    );

    NAMES
        .iter()
        .zip(roles)
        .enumerate()
        .map(|(index, (&name, (position, department, manager)))| {
            let id = index as u64 + 1;
            let draft = EmployeeDraft {
                manager_id: manager.map(EmployeeId),
                ..EmployeeDraft::new(name)
                    .position(position)
                    .department(department)
                    .email(email(name))
                    .phone(phone(id))
            };
            Employee::from_draft(EmployeeId(id), draft)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::validate_forest;

    #[test]
    fn given_generator_when_run_then_produces_valid_single_root_forest() {
        let employees = generate();

        assert_eq!(employees.len(), 20);
        assert!(validate_forest(&employees).is_empty());
        assert_eq!(employees.iter().filter(|e| e.is_root()).count(), 1);
        assert_eq!(employees[0].email, "john.smith@company.com");
        assert_eq!(employees[0].phone, "+1-555-101-1001");
    }

    #[test]
    fn given_staff_when_generated_then_reports_to_department_head() {
        let employees = generate();
        let recruiter = employees.iter().find(|e| e.position == "Recruiter").unwrap();
        let legal = employees.iter().find(|e| e.department == "Legal").unwrap();

        assert_eq!(recruiter.manager_id, Some(EmployeeId(8)));
        assert_eq!(legal.manager_id, Some(EmployeeId(1)));
    }
}
