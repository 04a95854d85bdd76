//! Static instruction text for the conversation driver. Data, not logic:
//! the driver feeds the prompt to its LLM, the greeting is spoken as the
//! first turn.

use calldesk_common::{ComplaintRecord, Language};
use serde::{Deserialize, Serialize};

/// Which desk this deployment answers for. The original call center ran the
/// complaint desk and the appointment desk as separate agent deployments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Desk {
    Complaints,
    Appointments,
}

impl Default for Desk {
    fn default() -> Self {
        Desk::Complaints
    }
}

/// Conversational branch chosen at session open.
pub enum PromptBranch<'a> {
    ReturningCaller(&'a ComplaintRecord),
    NewCaller,
    AppointmentDesk,
}

fn language_directive(language: Language) -> &'static str {
    match language {
        Language::English => "Communicate in polite, professional English.",
        Language::Hindi => "Communicate exclusively in Hindi.",
        Language::Gujarati => "Communicate exclusively in Gujarati.",
    }
}

const CLOSING_INSTRUCTIONS: &str = "\
After completing the operation:\n\
- Thank the customer and tell them they will receive an SMS confirmation.\n\
- Say: 'Thank you for calling Benchmark Service Center. Goodbye!'\n\
- You MUST use the end_call function to disconnect the call.\n\
- If the customer asks for a human agent, use the transfer_call function.";

const NEW_COMPLAINT_SEQUENCE: &str = "\
For new complaints, you MUST follow this exact sequence:\n\
a. First, ask ONLY for the customer's name: 'May I have your name, please?'\n\
b. After getting the name, ask ONLY for the complete address.\n\
c. After getting the address, ask ONLY about the product and its model name.\n\
d. Finally, ask about the specific issue they are experiencing.\n\
e. Before submission, summarize all collected information and ask for \
confirmation. Only after confirmation, use the submit_complaint function, \
then inform the customer about the SMS with their complaint number.\n\
f. After submission, announce: 'You may now hang up the call.'";

/// Build the system prompt for a call.
pub fn system_prompt(branch: &PromptBranch<'_>, language: Language) -> String {
    match branch {
        PromptBranch::ReturningCaller(previous) => format!(
            "You are a virtual call assistant for Benchmark Service Center. {}\n\
             The caller has contacted us before. Details of their last complaint:\n\
             - Complaint Number: {number}\n\
             - Name: {name}\n\
             - Product: {product}\n\
             - Issue: {issue}\n\
             - Status: {status}\n\
             - Priority: {priority}\n\n\
             Handle the call based on these scenarios:\n\
             1. Calling about the SAME ISSUE (priority escalation): express concern, \
             confirm their complaint number, then use the escalate_priority function \
             with complaint_number='{number}'. Use escalate_priority only ONCE per \
             call, and tell the customer an SMS confirmation is on its way.\n\
             2. Calling for a STATUS CHECK: share the status from the record above. \
             If the status is pending and the customer is dissatisfied, escalate as \
             in scenario 1.\n\
             3. A NEW issue: {sequence}\n\n\
             Start by asking: 'Are you calling about your existing complaint number \
             {number}, or do you have a new issue to report?'\n\
             Collect information one piece at a time and wait for a clear response \
             before moving on.\n{closing}",
            language_directive(language),
            number = previous.complaint_number,
            name = previous.name,
            product = previous.product,
            issue = previous.issue,
            status = previous.status,
            priority = previous.priority,
            sequence = NEW_COMPLAINT_SEQUENCE,
            closing = CLOSING_INSTRUCTIONS,
        ),
        PromptBranch::NewCaller => format!(
            "You are a virtual call assistant for Benchmark Service Center, providing \
             professional and empathetic customer service. {}\n\
             There are two possible scenarios:\n\
             1. The customer has an existing complaint but doesn't know the complaint \
             number: ask for details about their previous complaint, use them to \
             confirm the complaint number, then use the escalate_priority function \
             and inform them about the SMS confirmation.\n\
             2. {sequence}\n\n\
             IMPORTANT: never use submit_complaint until ALL information is collected \
             and confirmed. Collect information one piece at a time. If any response \
             is unclear, ask for clarification before moving forward.\n{closing}",
            language_directive(language),
            sequence = NEW_COMPLAINT_SEQUENCE,
            closing = CLOSING_INSTRUCTIONS,
        ),
        PromptBranch::AppointmentDesk => format!(
            "You are a virtual assistant for Benchmark Service Center's appointment \
             desk. {}\n\
             Assist customers in booking, modifying, or canceling service \
             appointments:\n\
             1. New booking: ask for their name, the reason for the visit, and the \
             preferred date and time, then confirm all details and use the \
             book_appointment function.\n\
             2. Modifying: ask for their registered phone number, share the current \
             appointment details, then use the modify_appointment function with the \
             new date and time.\n\
             3. Canceling: ask for their registered phone number, confirm the \
             appointment, then use the cancel_appointment function.\n\
             Always confirm details with the customer before proceeding, and inform \
             them about the SMS confirmation afterwards.\n{closing}",
            language_directive(language),
            closing = CLOSING_INSTRUCTIONS,
        ),
    }
}

/// First line spoken on the call.
pub fn greeting(language: Language, previous: Option<&ComplaintRecord>) -> String {
    match (language, previous) {
        (Language::English, Some(record)) => format!(
            "Welcome back to Benchmark Service Center. I can see your previous \
             complaint number {}. Are you calling about the same issue, or do you \
             have a new complaint?",
            record.complaint_number
        ),
        (Language::English, None) => {
            "Welcome to Benchmark Service Center. How can I help you today?".to_string()
        }
        (Language::Hindi, Some(record)) => format!(
            "बेंचमार्क सर्विस सेंटर में आपका फिर से स्वागत है। आपकी पिछली शिकायत \
             संख्या {} है। क्या आप उसी समस्या के बारे में कॉल कर रहे हैं?",
            record.complaint_number
        ),
        (Language::Hindi, None) => {
            "नमस्ते! बेंचमार्क सर्विस सेंटर में आपका स्वागत है। मैं आपकी कैसे सहायता \
             कर सकती हूँ?"
                .to_string()
        }
        (Language::Gujarati, Some(record)) => format!(
            "બેંચમાર્ક સર્વિસ સેન્ટરમાં ફરી આપનું સ્વાગત છે. આપની પાછલી ફરિયાદ નંબર \
             {} છે. શું આપ એ જ સમસ્યા વિશે કૉલ કરી રહ્યા છો?",
            record.complaint_number
        ),
        (Language::Gujarati, None) => {
            "નમસ્તે! બેંચમાર્ક સર્વિસ સેન્ટરમાં આપનું સ્વાગત છે. હું આપની કેવી રીતે \
             મદદ કરી શકું?"
                .to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn previous_complaint() -> ComplaintRecord {
        let mut record = ComplaintRecord::new(
            "Asha",
            "12 MG Road",
            "Model X200",
            "No hot water",
            "+919000000001",
        );
        record.complaint_number = "4821".to_string();
        record.priority = 2;
        record
    }

    #[test]
    fn test_returning_prompt_embeds_previous_complaint() {
        let record = previous_complaint();
        let prompt = system_prompt(
            &PromptBranch::ReturningCaller(&record),
            Language::English,
        );

        assert!(prompt.contains("4821"));
        assert!(prompt.contains("Model X200"));
        assert!(prompt.contains("escalate_priority"));
        assert!(prompt.contains("end_call"));
    }

    #[test]
    fn test_new_caller_prompt_asks_name_first() {
        let prompt = system_prompt(&PromptBranch::NewCaller, Language::English);
        assert!(prompt.contains("May I have your name, please?"));
        assert!(prompt.contains("submit_complaint"));
        assert!(!prompt.contains("book_appointment"));
    }

    #[test]
    fn test_appointment_prompt_names_all_three_tools() {
        let prompt = system_prompt(&PromptBranch::AppointmentDesk, Language::English);
        assert!(prompt.contains("book_appointment"));
        assert!(prompt.contains("modify_appointment"));
        assert!(prompt.contains("cancel_appointment"));
    }

    #[test]
    fn test_language_directive_is_applied() {
        let prompt = system_prompt(&PromptBranch::NewCaller, Language::Hindi);
        assert!(prompt.contains("exclusively in Hindi"));

        let prompt = system_prompt(&PromptBranch::NewCaller, Language::Gujarati);
        assert!(prompt.contains("exclusively in Gujarati"));
    }

    #[test]
    fn test_greetings_mention_previous_complaint_number() {
        let record = previous_complaint();
        for language in [Language::English, Language::Hindi, Language::Gujarati] {
            let line = greeting(language, Some(&record));
            assert!(line.contains("4821"));
        }
    }

    #[test]
    fn test_new_caller_greeting_is_localized() {
        assert!(greeting(Language::English, None).contains("Benchmark Service Center"));
        assert!(greeting(Language::Hindi, None).contains("नमस्ते"));
        assert!(greeting(Language::Gujarati, None).contains("નમસ્તે"));
    }
}
