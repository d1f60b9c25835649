//! Prompt rendering for one oracle round trip.

use lipidsort_shared::{Compound, Group};

/// Grammar and sorting guidance sent with every batch.
///
/// The response parser accepts exactly the two line forms named here.
const INSTRUCTIONS: &str = "\
Meticulously group these compounds based on their names, by specifying the group name next to each compound.
Create new groups if necessary or, if you notice a mistake, move compounds between groups using the format 'move <compound> from <old_group> to <new_group>'.
Format your response as 'Compound => Group' for sorting.
Group each compound into the most precise category based on its chemical structure, biological function, and standard biochemical classifications.
Take a nuanced approach to ensure that similar compounds like fatty acids, glycerolipids, glycerophospholipids, eicosanoids, vitamins, steroids, quinones, and lactones are identified and grouped together.
Try to avoid creating a group called 'Other', make an effort to find an accurate group for all compounds.
Do not include comments or explanations in your commands.
Do not include words like 'New', 'Group', or 'None' while sorting, and avoid mistakes such as attempting the command 'from none to new group'.
";

/// Render the prompt: current groups in insertion order, the instruction
/// block, then the batch by display name (formula suffix stripped).
pub fn build_prompt(groups: &[Group], batch: &[Compound]) -> String {
    let mut out = String::from("Here are the compounds already sorted into groups:\n");

    for group in groups {
        out.push_str("### ");
        out.push_str(&group.name);
        out.push_str(":\n");
        for member in &group.members {
            out.push_str("- ");
            out.push_str(member);
            out.push('\n');
        }
    }

    out.push('\n');
    out.push_str(INSTRUCTIONS);
    out.push_str("Group these compounds for now:\n");

    let names: Vec<String> = batch
        .iter()
        .map(|c| format!("- {}", c.display_name().trim()))
        .collect();
    out.push_str(&names.join("\n"));

    out
}
