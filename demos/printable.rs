use vt_parser::{Callbacks, CsiArg, Parser, StringFragment};

#[derive(Default)]
struct PrintActor;

impl Callbacks for PrintActor {
    fn text(&mut self, bytes: &[u8]) -> usize {
        println!("text: {:?}", String::from_utf8_lossy(bytes));
        bytes.len()
    }

    fn control(&mut self, byte: u8) -> bool {
        println!("control: {byte:#04x}");
        true
    }

    fn escape(&mut self, sequence: &[u8]) -> bool {
        println!("escape: {sequence:?}");
        true
    }

    fn csi(
        &mut self,
        leader: Option<&[u8]>,
        args: &[CsiArg],
        intermediates: Option<&[u8]>,
        final_byte: u8,
    ) -> bool {
        println!(
            "CSI: leader={leader:?} args={args:?} intermediates={intermediates:?} final={final_byte:#04x}"
        );
        true
    }

    fn osc(&mut self, command: i32, fragment: StringFragment<'_>) -> bool {
        println!("OSC: command={command} fragment={fragment:?}");
        true
    }

    fn dcs(&mut self, command: &[u8], fragment: StringFragment<'_>) -> bool {
        println!("DCS: command={command:?} fragment={fragment:?}");
        true
    }
}

fn main() {
    let mut parser = Parser::new();
    let mut actor = PrintActor;
    parser.write(b"\x1b[31mhi\x1b[0m\x1b]0;title\x07", &mut actor);
}
