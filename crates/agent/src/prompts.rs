//! Prompt text for the LLM-backed capabilities.
//!
//! Every builder returns a `(system, user)` pair.

use dealerbot_core::domain::field::{FieldPath, SCHEMA_FIELDS};

use crate::capability::{ComposeRequest, Framing};
use crate::router::Route;

pub const MISSING_INFORMATION_FALLBACK: &str = "I'm sorry, I don't have that specific information right now. Would you like me to pass along your inquiry to a team member and have them get in touch with you?";

const ASSISTANT_ROLE: &str = "You are the virtual sales assistant of a Ford dealership. You only discuss Ford vehicles and this dealership's inventory.";

const ROUTING_GUIDE: &str = "\
- Specific Vehicle: questions about a property of a vehicle (specs, features, price, color, trim, VIN).
- Inventory Search: checking whether vehicles are in stock.
- Ford Expert: general Ford questions, recommendations, suitability or opinion (\"Is X good for Y?\", \"Would you recommend...?\").
- Customer Relations: greetings, small talk, off-topic chat.
- Follow-up: replies to the previous answer (\"show me\", \"yes\").
- Show Form: test drive, quote or contact requests.
When a query asks whether a vehicle suits a lifestyle, family, pets or use, or asks for an opinion, answer Ford Expert even if a specific model or trim is named. Pure greetings and off-topic chat are Customer Relations.
Examples:
- 'Hi, how are you doing today?' => Customer Relations
- 'Tell me a joke' => Customer Relations
- 'Do you have any Escape vehicles in stock?' => Inventory Search
- 'What is the horsepower of the Escape ST-Line?' => Specific Vehicle
- 'Would you recommend the Bronco Sport for camping?' => Ford Expert
- 'Is the Escape ST-Line good for a mother of 3 with 2 dogs?' => Ford Expert
- 'Is the Mustang a good car for winter driving?' => Ford Expert";

const INTEREST_GUIDE: &str =
    "Pick the vehicle field the user most wants to know about. Answer with the field name exactly as written.";

const EXTRACTION_EXAMPLES: &str = "\
- 'Do you have any 2024 Ford Escape vehicles in stock?' -> {\"parsed_name[year]\": \"2024\", \"parsed_name[make]\": \"Ford\", \"parsed_name[model]\": \"Escape\"}
- 'Show me all 2025 Bronco Black Diamond SUVs' -> {\"parsed_name[year]\": \"2025\", \"parsed_name[model]\": \"Bronco\", \"parsed_name[trim]\": \"Black Diamond\", \"parsed_name[vehicle_type]\": \"SUV\"}
- 'Are there any 2025 ST-Line trims available?' -> {\"parsed_name[year]\": \"2025\", \"parsed_name[trim]\": \"ST-Line\"}
- 'What is the horsepower of the 2024 Bronco?' -> {\"parsed_name[year]\": \"2024\", \"parsed_name[model]\": \"Bronco\", \"specifications[horsepower]\": \"Unknown\"}
- 'Do you have any Ford vehicles?' -> {\"parsed_name[make]\": \"Ford\"}
- 'Tell me about the Escape ST-Line' -> {\"parsed_name[model]\": \"Escape\", \"parsed_name[trim]\": \"ST-Line\"}";

const STYLE_RULES: &str = "Keep the answer short and to the point; the customer is busy. Be friendly and professional. Never suggest visiting an external website or contacting another dealership.";

pub fn classification(text: &str, labels: &[&str], context: &str) -> (String, String) {
    let guide = if labels == Route::LABELS.as_slice() {
        ROUTING_GUIDE
    } else if labels.iter().all(|label| SCHEMA_FIELDS.contains(label)) {
        INTEREST_GUIDE
    } else {
        ""
    };

    let system = format!(
        "{ASSISTANT_ROLE}\nClassify the customer's message. Reply with exactly one of these labels and nothing else: {}.",
        labels.join(", ")
    );
    let user = format!("Message: '{text}'\n{context}\n{guide}");
    (system, user)
}

pub fn full_listing(text: &str, context: &str) -> (String, String) {
    let system = format!(
        "{ASSISTANT_ROLE}\nDecide whether the customer wants to see every vehicle matching a make, model, type, year or trim. Reply with 'true' or 'false' only."
    );
    let user = format!(
        "Message: '{text}'\nContext: {context}\n\
         Answer true for requests such as 'Show me all Escape vehicles', 'Show me every Bronco', 'What Escape vehicles do you have?'.\n\
         Answer false for 'Show me all vehicles' with no filter, and for single-vehicle or summary questions such as 'Do you have any Escapes?' or 'What is the price of the Mustang?'.\n\
         If the context shows the customer is asking about a specific vehicle and now wants to see them all, answer true."
    );
    (system, user)
}

pub fn extraction(text: &str, schema: &[FieldPath]) -> (String, String) {
    let fields = schema.iter().map(|field| format!("- {field}")).collect::<Vec<_>>().join("\n");
    let system = format!(
        "{ASSISTANT_ROLE}\nExtract search parameters from the customer's message. Reply with a single JSON object and nothing else."
    );
    let user = format!(
        "Message: '{text}'\n\
         Allowed keys:\n{fields}\n\n\
         Ignore anything that does not map to an allowed key. When the customer asks about an allowed key without giving its value, set it to \"Unknown\". \
         Split combined names into year, make, model and trim wherever you can.\n\
         Examples:\n{EXTRACTION_EXAMPLES}"
    );
    (system, user)
}

pub fn composition(request: &ComposeRequest<'_>) -> (String, String) {
    let ComposeRequest { framing, query, material, history } = *request;
    match framing {
        Framing::Answer => (
            format!("{ASSISTANT_ROLE}\nTurn raw inventory data into a natural answer. {STYLE_RULES}"),
            format!(
                "Customer question: '{query}'\nRaw data: {material}\n{history}\n\
                 Answer the question directly using the raw data, format lists so they are easy to read, and suggest a sensible next step. \
                 If the data says 'Not in stock' or the information is missing or unknown, reply with: '{MISSING_INFORMATION_FALLBACK}'"
            ),
        ),
        Framing::Expert => (
            format!(
                "{ASSISTANT_ROLE}\nYou are a Ford product specialist who knows the current lineup, trims, safety systems and technologies. {STYLE_RULES}"
            ),
            format!(
                "Customer question: '{query}'\n{history}\n{material}\n\
                 Address the question directly, name specific Ford models and trims when recommending, mention relevant safety features, \
                 and consider the customer's needs (family, performance, efficiency). Stay within Ford's current lineup."
            ),
        ),
        Framing::Conversational => (
            format!("{ASSISTANT_ROLE}\nYou handle small talk warmly and professionally. {STYLE_RULES}"),
            format!(
                "Customer message: '{query}'\n{history}\n{material}\n\
                 Reply in a friendly way. If the conversation is off-topic, gently steer it back to Ford vehicles without being pushy."
            ),
        ),
        Framing::Availability => (
            format!("{ASSISTANT_ROLE}\nYou tell customers whether vehicles are in stock. {STYLE_RULES}"),
            format!(
                "Customer question: '{query}'\nAvailability: {material}\n{history}\n\
                 Say whether the vehicle is available and how many are in stock, then offer to show details or answer specific questions."
            ),
        ),
        Framing::Comparison => (
            format!(
                "{ASSISTANT_ROLE}\nYou compare vehicles with a focus on practical, real-world differences. Reply with a single JSON object and nothing else."
            ),
            format!(
                "User context: {history}\nVehicles to compare: {material}\n\n\
                 Cover value for money, which lifestyle each vehicle suits, the differences that matter day to day, running costs and warranty, \
                 family friendliness, and comfort technology.\n\
                 Use exactly these string keys: summary, key_differences, best_for, value_analysis, practical_considerations, recommendation. \
                 Base the recommendation on the user context when there is one."
            ),
        ),
    }
}

#[cfg(test)]
mod tests {
    use dealerbot_core::domain::field::{FieldPath, SCHEMA_FIELDS};

    use super::{classification, composition, extraction, MISSING_INFORMATION_FALLBACK};
    use crate::capability::{ComposeRequest, Framing};
    use crate::router::Route;

    #[test]
    fn routing_prompt_lists_every_label_and_tie_break() {
        let (system, user) = classification("hi", Route::LABELS.as_slice(), "");
        for label in Route::LABELS {
            assert!(system.contains(label), "missing `{label}`");
        }
        assert!(user.contains("answer Ford Expert even if a specific model"));
    }

    #[test]
    fn interest_prompt_uses_field_guide() {
        let (_, user) = classification("how much?", SCHEMA_FIELDS.as_slice(), "");
        assert!(user.contains("field name exactly as written"));
        assert!(!user.contains("Customer Relations"));
    }

    #[test]
    fn extraction_prompt_lists_schema_fields() {
        let (_, user) = extraction("any broncos?", &FieldPath::schema());
        assert!(user.contains("- specifications[horsepower]\n"));
        assert!(user.contains("\"Unknown\""));
    }

    #[test]
    fn answer_framing_carries_fallback_sentence() {
        let request = ComposeRequest {
            framing: Framing::Answer,
            query: "price?",
            material: "Not in stock",
            history: "",
        };
        let (system, user) = composition(&request);
        assert!(user.contains(MISSING_INFORMATION_FALLBACK));
        assert!(system.contains("Never suggest visiting an external website"));
    }
}
