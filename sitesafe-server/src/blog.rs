//! Safety Measures Blog page

use crate::render::{layout, Page};

const ARTICLE: &str = r#"<h1>Safety Measures Blog</h1>
<h3>Construction Site Safety: Key Measures to Protect Your Workforce</h3>
<p>In the dynamic environment of a construction site, safety should always be the top priority. Here are some essential measures:</p>
<ol>
<li><strong>Personal Protective Equipment (PPE):</strong><br>
Always ensure that all personnel are equipped with the necessary PPE such as helmets, gloves, high-visibility vests, and protective footwear.</li>
<li><strong>Site Inspections and Hazard Identification:</strong><br>
Regularly conduct thorough site inspections to identify potential hazards. Implement corrective measures promptly.</li>
<li><strong>Training and Awareness:</strong><br>
Provide regular training sessions on safety practices and emergency procedures. Educate workers about the importance of PPE and how to use it correctly.</li>
<li><strong>Emergency Preparedness:</strong><br>
Establish clear protocols for emergency situations. Ensure that emergency exits, first aid kits, and communication devices are easily accessible.</li>
<li><strong>Regular Maintenance:</strong><br>
Keep all equipment and machinery in good working order with routine maintenance checks to avoid malfunctions that could lead to accidents.</li>
</ol>
<p>By integrating these measures, construction sites can minimize risks and protect workers, ensuring a safer work environment for everyone involved.</p>"#;

pub fn blog_page() -> String {
    layout("Safety Measures Blog", Some(Page::Blog), ARTICLE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blog_page() {
        let page = blog_page();
        assert!(page.contains("Construction Site Safety: Key Measures to Protect Your Workforce"));
        assert!(page.contains("Regular Maintenance"));
        assert!(page.contains("<a href=\"/blog\" class=\"active\">"));
    }
}
